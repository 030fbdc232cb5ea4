// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence trait for conversation logs.

use async_trait::async_trait;

use crate::error::PitchcraftError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationId, ConversationTurn, NewTurn};

/// Append-only, per-conversation turn log.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Appends `turns` atomically, in order, assigning consecutive sequence
    /// numbers after the current maximum. Either every turn is written or none.
    async fn append_turns(
        &self,
        conversation_id: &ConversationId,
        turns: Vec<NewTurn>,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError>;

    /// Up to `limit` turns with sequence number below `before` (or the newest
    /// turns when `before` is `None`), newest first.
    async fn turns_before(
        &self,
        conversation_id: &ConversationId,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError>;

    /// The full log, oldest first.
    async fn all_turns(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError>;

    async fn turn_count(&self, conversation_id: &ConversationId) -> Result<u64, PitchcraftError>;
}
