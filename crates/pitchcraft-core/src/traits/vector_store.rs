// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store adapter trait.

use async_trait::async_trait;

use crate::error::PitchcraftError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{EmbeddedFragment, FragmentId, KnowledgeFragment, ScoredFragment, UserScope};

/// Stores knowledge fragments with their embeddings and answers
/// scope-filtered similarity queries.
///
/// Infrastructure failures are reported as
/// [`PitchcraftError::VectorStoreUnavailable`].
#[async_trait]
pub trait VectorStoreAdapter: PluginAdapter {
    /// Inserts or replaces fragments keyed by id.
    ///
    /// A replaced fragment gets `version + 1` and a fresh `created_at`; the
    /// increment happens inside the store. Returns the stored fragments in
    /// input order.
    async fn upsert(
        &self,
        fragments: &[EmbeddedFragment],
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError>;

    /// Up to `k` fragments of `scope` by descending cosine similarity.
    async fn search(
        &self,
        scope: &UserScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredFragment>, PitchcraftError>;

    /// Every fragment stored for `scope`, ordered by source field.
    async fn fragments_for_scope(
        &self,
        scope: &UserScope,
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError>;

    async fn count(&self, scope: &UserScope) -> Result<u64, PitchcraftError>;

    /// Deletes one fragment. Returns whether it existed.
    async fn delete(&self, id: &FragmentId) -> Result<bool, PitchcraftError>;
}
