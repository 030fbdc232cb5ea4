// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local sentence embeddings for Pitchcraft.
//!
//! [`ModelManager`] fetches the all-MiniLM-L6-v2 INT8 model and tokenizer on
//! first run; [`OnnxEmbedder`] runs it on CPU and implements
//! [`EmbeddingAdapter`](pitchcraft_core::EmbeddingAdapter).

pub mod embedder;
pub mod model_manager;

pub use embedder::{EMBEDDING_DIM, OnnxEmbedder};
pub use model_manager::ModelManager;
