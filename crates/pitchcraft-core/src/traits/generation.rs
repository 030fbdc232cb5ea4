// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation adapter trait.

use async_trait::async_trait;

use crate::error::PitchcraftError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationRequest, GenerationResponse};

/// A text-completion capability.
///
/// Failures are reported as [`PitchcraftError::GenerationFailed`] with a
/// kind that tells the caller whether a retry makes sense.
#[async_trait]
pub trait GenerationAdapter: PluginAdapter {
    async fn complete(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, PitchcraftError>;
}
