// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding adapter trait.

use async_trait::async_trait;

use crate::error::PitchcraftError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddingInput, EmbeddingOutput};

/// Converts text into fixed-dimension vectors.
///
/// Implementations must be deterministic for identical text and report
/// failures as [`PitchcraftError::EmbeddingUnavailable`].
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding per input text, in input order.
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, PitchcraftError>;

    /// Dimension of every vector this adapter produces.
    fn dimensions(&self) -> usize;
}
