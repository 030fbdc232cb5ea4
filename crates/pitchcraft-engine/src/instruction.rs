// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System instruction loading.

use pitchcraft_config::model::AgentConfig;
use tracing::{info, warn};

/// Loads the system instruction following config priority: file > inline > default.
///
/// An unreadable or empty instruction file is logged and skipped rather than
/// failing startup.
pub async fn load_system_prompt(config: &AgentConfig) -> String {
    if let Some(ref file_path) = config.system_prompt_file {
        match tokio::fs::read_to_string(file_path).await {
            Ok(content) => {
                let trimmed = content.trim().to_string();
                if !trimmed.is_empty() {
                    info!(path = file_path.as_str(), "loaded system prompt from file");
                    return trimmed;
                }
                warn!(path = file_path.as_str(), "system prompt file is empty, falling back");
            }
            Err(e) => {
                warn!(
                    path = file_path.as_str(),
                    error = %e,
                    "failed to read system prompt file, falling back"
                );
            }
        }
    }

    if let Some(ref prompt) = config.system_prompt
        && !prompt.trim().is_empty()
    {
        return prompt.trim().to_string();
    }

    default_instruction(&config.name)
}

fn default_instruction(name: &str) -> String {
    format!(
        "You are {name}, an AI marketing strategist. Write personalised marketing \
         content for the business described below. Stay consistent with its facts \
         and tone of voice, and do not invent details it has not given you."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_names_the_agent() {
        let config = AgentConfig::default();
        let prompt = load_system_prompt(&config).await;
        assert!(prompt.starts_with("You are pitchcraft, an AI marketing strategist."));
    }

    #[tokio::test]
    async fn inline_overrides_default() {
        let config = AgentConfig {
            system_prompt: Some("  Be bold.  ".into()),
            ..AgentConfig::default()
        };
        assert_eq!(load_system_prompt(&config).await, "Be bold.");
    }

    #[tokio::test]
    async fn file_overrides_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "\nFrom the file.\n").unwrap();

        let config = AgentConfig {
            system_prompt: Some("inline".into()),
            system_prompt_file: Some(path.to_string_lossy().to_string()),
            ..AgentConfig::default()
        };
        assert_eq!(load_system_prompt(&config).await, "From the file.");
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_inline() {
        let config = AgentConfig {
            system_prompt: Some("inline".into()),
            system_prompt_file: Some("/nonexistent/pitchcraft/prompt.md".into()),
            ..AgentConfig::default()
        };
        assert_eq!(load_system_prompt(&config).await, "inline");
    }
}
