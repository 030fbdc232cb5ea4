// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Character-ratio token estimation shared by memory windowing and prompt budgeting.

use pitchcraft_config::model::MemoryConfig;

/// Estimates tokens as `ceil(chars / chars_per_token)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimator {
    chars_per_token: usize,
    per_turn_overhead: usize,
}

impl TokenEstimator {
    pub fn new(chars_per_token: usize, per_turn_overhead: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            per_turn_overhead,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new(config.chars_per_token, config.per_turn_overhead)
    }

    /// Estimated tokens for `text`. Counts chars, not bytes.
    pub fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    /// Estimated tokens for one conversation turn including its delimiter overhead.
    pub fn turn_cost(&self, text: &str) -> usize {
        self.estimate(text) + self.per_turn_overhead
    }

    pub fn per_turn_overhead(&self) -> usize {
        self.per_turn_overhead
    }

    /// Longest char-boundary prefix of `text` whose estimate fits `tokens`.
    pub fn truncate(&self, text: &str, tokens: usize) -> String {
        let max_chars = tokens.saturating_mul(self.chars_per_token);
        text.chars().take(max_chars).collect()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}
