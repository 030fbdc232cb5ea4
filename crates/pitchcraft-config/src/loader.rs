// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./pitchcraft.toml` > `~/.config/pitchcraft/pitchcraft.toml`
//! > `/etc/pitchcraft/pitchcraft.toml` with environment variable overrides via the
//! `PITCHCRAFT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PitchcraftConfig;

/// Config sections addressable from the environment, longest first so that
/// `vector_store_url` never matches a shorter section name.
const ENV_SECTIONS: &[&str] = &[
    "vector_store",
    "generation",
    "retrieval",
    "ingestion",
    "embedding",
    "storage",
    "memory",
    "prompt",
    "agent",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/pitchcraft/pitchcraft.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "pitchcraft.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pitchcraft/pitchcraft.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pitchcraft/pitchcraft.toml` (system-wide)
/// 3. `~/.config/pitchcraft/pitchcraft.toml` (user XDG config)
/// 4. `./pitchcraft.toml` (local directory)
/// 5. `PITCHCRAFT_*` environment variables
pub fn load_config() -> Result<PitchcraftConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PitchcraftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PitchcraftConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PitchcraftConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PitchcraftConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PitchcraftConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Environment provider with explicit section-to-dot mapping.
///
/// `Env::split("_")` would turn `PITCHCRAFT_AGENT_SYSTEM_PROMPT_FILE` into
/// `agent.system.prompt.file`; only the first section separator is replaced.
fn env_provider() -> Env {
    Env::prefixed("PITCHCRAFT_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
            && !rest.is_empty()
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("agent_log_level"), "agent.log_level");
        assert_eq!(
            map_env_key("agent_system_prompt_file"),
            "agent.system_prompt_file"
        );
        assert_eq!(map_env_key("vector_store_api_key"), "vector_store.api_key");
        assert_eq!(map_env_key("generation_api_key"), "generation.api_key");
        assert_eq!(
            map_env_key("memory_max_window_tokens"),
            "memory.max_window_tokens"
        );
        assert_eq!(map_env_key("ingestion_force_reembed"), "ingestion.force_reembed");
    }

    #[test]
    fn unknown_env_keys_pass_through() {
        assert_eq!(map_env_key("telemetry_url"), "telemetry_url");
        assert_eq!(map_env_key("agent_"), "agent_");
    }

    #[test]
    fn string_overrides_defaults() {
        let config = load_config_from_str(
            r#"
[generation]
model = "gemini-2.5-pro"
timeout_secs = 30
"#,
        )
        .unwrap();
        assert_eq!(config.generation.model, "gemini-2.5-pro");
        assert_eq!(config.generation.timeout_secs, 30);
        assert_eq!(config.generation.max_retries, 3);
    }

    #[test]
    fn file_path_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pitchcraft.toml");
        std::fs::write(&path, "[prompt]\nbudget_tokens = 2048\n").unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.prompt.budget_tokens, 2048);
    }
}
