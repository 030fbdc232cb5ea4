// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Pitchcraft capability seams.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod conversation;
pub mod embedding;
pub mod generation;
pub mod vector_store;

pub use adapter::PluginAdapter;
pub use conversation::ConversationStore;
pub use embedding::EmbeddingAdapter;
pub use generation::GenerationAdapter;
pub use vector_store::VectorStoreAdapter;
