// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation memory: append-only writes and budgeted windows.

use std::sync::Arc;

use pitchcraft_config::model::MemoryConfig;
use pitchcraft_core::{
    ConversationId, ConversationStore, ConversationTurn, MemoryWindow, NewTurn, PitchcraftError,
    Role,
};
use tracing::debug;

use crate::estimate::TokenEstimator;

/// The only writer of conversation turns.
pub struct ConversationMemory {
    store: Arc<dyn ConversationStore>,
    estimator: TokenEstimator,
    page_size: usize,
}

impl ConversationMemory {
    pub fn new(store: Arc<dyn ConversationStore>, config: &MemoryConfig) -> Self {
        Self {
            store,
            estimator: TokenEstimator::from_config(config),
            page_size: config.page_size.max(1),
        }
    }

    pub fn estimator(&self) -> TokenEstimator {
        self.estimator
    }

    /// Appends a single turn; the store assigns the next sequence number.
    pub async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        text: impl Into<String>,
    ) -> Result<ConversationTurn, PitchcraftError> {
        let text = text.into();
        self.store
            .append_turns(conversation_id, vec![NewTurn { role, text }])
            .await?
            .pop()
            .ok_or_else(|| PitchcraftError::Internal("store returned no appended turn".into()))
    }

    /// Appends a user turn and its assistant reply as `N+1` and `N+2`.
    ///
    /// Both turns are written in one transaction: a concurrent exchange on the
    /// same conversation cannot land between them, and a cancelled caller
    /// leaves either both turns or neither.
    pub async fn append_exchange(
        &self,
        conversation_id: &ConversationId,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) -> Result<(ConversationTurn, ConversationTurn), PitchcraftError> {
        let mut written = self
            .store
            .append_turns(
                conversation_id,
                vec![NewTurn::user(user_text), NewTurn::assistant(assistant_text)],
            )
            .await?;
        match (written.pop(), written.pop()) {
            (Some(assistant), Some(user)) => Ok((user, assistant)),
            _ => Err(PitchcraftError::Internal(
                "store returned an incomplete exchange".into(),
            )),
        }
    }

    /// The most recent turns whose estimated cost fits `budget_tokens`,
    /// oldest first.
    ///
    /// Pages backwards through the log so the full history is never loaded.
    /// With a positive budget the newest turn is always present, truncated if
    /// it alone does not fit. A non-empty newest turn keeps at least one
    /// token of text, so `estimated_tokens` can exceed a budget no larger
    /// than the per-turn overhead.
    pub async fn window(
        &self,
        conversation_id: &ConversationId,
        budget_tokens: usize,
    ) -> Result<MemoryWindow, PitchcraftError> {
        if budget_tokens == 0 {
            let total = self.store.turn_count(conversation_id).await?;
            return Ok(MemoryWindow::empty(total));
        }

        let mut newest_first: Vec<ConversationTurn> = Vec::new();
        let mut used = 0usize;
        let mut truncated = false;
        let mut omitted = 0u64;
        let mut before = None;

        'pages: loop {
            let page = self
                .store
                .turns_before(conversation_id, before, self.page_size)
                .await?;
            let exhausted = page.len() < self.page_size;
            before = page.last().map(|t| t.sequence_number);

            for mut turn in page {
                let cost = self.estimator.turn_cost(&turn.text);
                if used + cost <= budget_tokens {
                    used += cost;
                    newest_first.push(turn);
                    continue;
                }

                if newest_first.is_empty() {
                    // At least one token of text survives even when the
                    // overhead alone uses up the budget.
                    let room = budget_tokens
                        .saturating_sub(self.estimator.per_turn_overhead())
                        .max(1);
                    turn.text = self.estimator.truncate(&turn.text, room);
                    used = self.estimator.turn_cost(&turn.text);
                    if used > budget_tokens {
                        debug!(
                            conversation_id = %conversation_id,
                            budget_tokens,
                            used,
                            "newest turn kept over budget"
                        );
                    }
                    truncated = true;
                    omitted = turn.sequence_number.saturating_sub(1);
                    newest_first.push(turn);
                } else {
                    // Sequence numbers are gap-free from 1, so everything at or
                    // below this turn is left out.
                    omitted = turn.sequence_number;
                }
                break 'pages;
            }

            if exhausted || before.is_none() {
                break;
            }
        }

        newest_first.reverse();
        debug!(
            conversation_id = %conversation_id,
            budget_tokens,
            turns = newest_first.len(),
            omitted,
            truncated,
            "memory window built"
        );
        Ok(MemoryWindow {
            turns: newest_first,
            omitted,
            truncated,
            estimated_tokens: used,
        })
    }

    /// Full chronological log.
    pub async fn turns(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError> {
        self.store.all_turns(conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchcraft_storage::{Database, SqliteStorage};
    use proptest::prelude::*;

    fn config(page_size: usize) -> MemoryConfig {
        MemoryConfig {
            chars_per_token: 4,
            per_turn_overhead: 1,
            page_size,
            ..MemoryConfig::default()
        }
    }

    async fn memory(page_size: usize) -> ConversationMemory {
        let db = Database::open_in_memory().await.unwrap();
        ConversationMemory::new(Arc::new(SqliteStorage::new(db)), &config(page_size))
    }

    fn cid() -> ConversationId {
        ConversationId::new("conv").unwrap()
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence() {
        let mem = memory(8).await;
        let a = mem.append(&cid(), Role::User, "one").await.unwrap();
        let b = mem.append(&cid(), Role::Assistant, "two").await.unwrap();
        assert_eq!((a.sequence_number, b.sequence_number), (1, 2));
    }

    #[tokio::test]
    async fn append_exchange_orders_user_first() {
        let mem = memory(8).await;
        mem.append(&cid(), Role::User, "earlier").await.unwrap();
        let (user, assistant) = mem
            .append_exchange(&cid(), "question", "answer")
            .await
            .unwrap();
        assert_eq!(user.sequence_number, 2);
        assert_eq!(user.role, Role::User);
        assert_eq!(assistant.sequence_number, 3);
        assert_eq!(assistant.role, Role::Assistant);
    }

    #[tokio::test]
    async fn window_of_empty_conversation_is_empty() {
        let mem = memory(8).await;
        let window = mem.window(&cid(), 100).await.unwrap();
        assert!(window.is_empty());
        assert_eq!(window.omitted, 0);
    }

    #[tokio::test]
    async fn zero_budget_yields_empty_window() {
        let mem = memory(8).await;
        mem.append(&cid(), Role::User, "hello").await.unwrap();
        let window = mem.window(&cid(), 0).await.unwrap();
        assert!(window.is_empty());
        assert_eq!(window.omitted, 1);
    }

    #[tokio::test]
    async fn window_keeps_newest_turns_in_order() {
        let mem = memory(2).await;
        for i in 1..=6 {
            // 8 chars -> 2 tokens + 1 overhead = 3 per turn
            mem.append(&cid(), Role::User, format!("turn-{i:03}")).await.unwrap();
        }
        let window = mem.window(&cid(), 10).await.unwrap();
        let seqs: Vec<u64> = window.turns.iter().map(|t| t.sequence_number).collect();
        assert_eq!(seqs, vec![4, 5, 6]);
        assert_eq!(window.omitted, 3);
        assert_eq!(window.estimated_tokens, 9);
        assert!(!window.truncated);
    }

    #[tokio::test]
    async fn oversized_newest_turn_is_truncated_not_dropped() {
        let mem = memory(8).await;
        mem.append(&cid(), Role::User, "short").await.unwrap();
        mem.append(&cid(), Role::Assistant, "x".repeat(400)).await.unwrap();

        let window = mem.window(&cid(), 5).await.unwrap();
        assert_eq!(window.turns.len(), 1);
        assert_eq!(window.turns[0].sequence_number, 2);
        assert!(window.truncated);
        assert_eq!(window.turns[0].text.len(), 16);
        assert_eq!(window.omitted, 1);
        assert!(window.estimated_tokens <= 5);

        // The stored turn is untouched.
        let stored = mem.turns(&cid()).await.unwrap();
        assert_eq!(stored[1].text.len(), 400);
    }

    #[tokio::test]
    async fn budget_within_turn_overhead_keeps_newest_text() {
        let db = Database::open_in_memory().await.unwrap();
        let mem = ConversationMemory::new(
            Arc::new(SqliteStorage::new(db)),
            &MemoryConfig::default(),
        );
        mem.append(&cid(), Role::User, "Hello there, write me a tagline")
            .await
            .unwrap();

        let overhead = MemoryConfig::default().per_turn_overhead;
        for budget in 1..=overhead {
            let window = mem.window(&cid(), budget).await.unwrap();
            assert_eq!(window.turns.len(), 1, "budget {budget}");
            assert_eq!(window.turns[0].text, "Hell", "budget {budget}");
            assert!(window.truncated);
            assert_eq!(window.estimated_tokens, overhead + 1);
        }

        let window = mem.window(&cid(), overhead + 1).await.unwrap();
        assert_eq!(window.turns[0].text, "Hell");
        assert_eq!(window.estimated_tokens, overhead + 1);
    }

    #[tokio::test]
    async fn whole_history_fits() {
        let mem = memory(3).await;
        for i in 0..7 {
            mem.append(&cid(), Role::User, format!("m{i}")).await.unwrap();
        }
        let window = mem.window(&cid(), 1_000).await.unwrap();
        assert_eq!(window.turns.len(), 7);
        assert_eq!(window.omitted, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn window_is_a_suffix_containing_the_newest_turn(
            lengths in prop::collection::vec(0usize..120, 1..25),
            budget in 1usize..200,
            page_size in 1usize..6,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let (window, total) = rt.block_on(async {
                let mem = memory(page_size).await;
                for (i, len) in lengths.iter().enumerate() {
                    let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                    mem.append(&cid(), role, "a".repeat(*len)).await.unwrap();
                }
                (mem.window(&cid(), budget).await.unwrap(), lengths.len() as u64)
            });

            prop_assert!(!window.turns.is_empty());
            prop_assert_eq!(window.turns.last().unwrap().sequence_number, total);
            if *lengths.last().unwrap() > 0 {
                prop_assert!(!window.turns.last().unwrap().text.is_empty());
            }

            let seqs: Vec<u64> = window.turns.iter().map(|t| t.sequence_number).collect();
            let expected: Vec<u64> = (window.omitted + 1..=total).collect();
            prop_assert_eq!(seqs, expected);

            if !window.truncated {
                prop_assert!(window.estimated_tokens <= budget);
            } else {
                prop_assert_eq!(window.turns.len(), 1);
            }
        }
    }
}
