// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation memory for the Pitchcraft RAG engine.
//!
//! [`ConversationMemory`] is the sole writer of conversation turns and builds
//! bounded [`MemoryWindow`](pitchcraft_core::MemoryWindow)s for prompt assembly.
//! [`TokenEstimator`] is the shared chars-per-token heuristic.

pub mod estimate;
pub mod window;

pub use estimate::TokenEstimator;
pub use window::ConversationMemory;
