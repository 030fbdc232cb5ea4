// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violated constraint instead of failing on the first one.

use crate::diagnostic::ConfigError;
use crate::model::{PitchcraftConfig, VectorBackend};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &PitchcraftConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        fail(format!(
            "agent.log_level `{}` must be one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.embedding.timeout_ms == 0 {
        fail("embedding.timeout_ms must be greater than 0".to_string());
    }
    if config.embedding.dimensions == 0 {
        fail("embedding.dimensions must be greater than 0".to_string());
    }

    if config.vector_store.backend == VectorBackend::Qdrant {
        if config.vector_store.url.trim().is_empty() {
            fail("vector_store.url must not be empty when backend = \"qdrant\"".to_string());
        }
        if config.vector_store.collection.trim().is_empty() {
            fail(
                "vector_store.collection must not be empty when backend = \"qdrant\"".to_string(),
            );
        }
    }

    if config.retrieval.top_k == 0 {
        fail("retrieval.top_k must be at least 1".to_string());
    }
    if config.retrieval.candidate_pool == 0 {
        fail("retrieval.candidate_pool must be at least 1".to_string());
    }
    if let Some(min) = config.retrieval.min_score
        && !(-1.0..=1.0).contains(&min)
    {
        fail(format!(
            "retrieval.min_score must be between -1.0 and 1.0, got {min}"
        ));
    }

    if config.memory.chars_per_token == 0 {
        fail("memory.chars_per_token must be at least 1".to_string());
    }
    if config.memory.page_size == 0 {
        fail("memory.page_size must be at least 1".to_string());
    }
    if config.memory.min_window_tokens > config.memory.max_window_tokens {
        fail(format!(
            "memory.min_window_tokens ({}) must not exceed memory.max_window_tokens ({})",
            config.memory.min_window_tokens, config.memory.max_window_tokens
        ));
    }
    if config.memory.min_window_tokens <= config.memory.per_turn_overhead {
        fail(format!(
            "memory.min_window_tokens ({}) must exceed memory.per_turn_overhead ({}) so the newest turn keeps some text",
            config.memory.min_window_tokens, config.memory.per_turn_overhead
        ));
    }

    if config.prompt.budget_tokens == 0 {
        fail("prompt.budget_tokens must be greater than 0".to_string());
    }

    if config.generation.model.trim().is_empty() {
        fail("generation.model must not be empty".to_string());
    }
    if config.generation.timeout_secs == 0 {
        fail("generation.timeout_secs must be greater than 0".to_string());
    }
    if config.generation.max_output_tokens == 0 {
        fail("generation.max_output_tokens must be greater than 0".to_string());
    }
    if let Some(t) = config.generation.temperature
        && !(0.0..=2.0).contains(&t)
    {
        fail(format!(
            "generation.temperature must be between 0.0 and 2.0, got {t}"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
