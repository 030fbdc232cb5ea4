// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pitchcraft RAG engine.
//!
//! Trait definitions for the swappable capabilities (embedding, vector
//! storage, generation, conversation persistence), the shared error type and
//! the domain types that flow between them.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{GenerationFailureKind, PitchcraftError};
pub use types::{
    AdapterType, ConversationId, ConversationTurn, EmbeddedFragment, EmbeddingInput,
    EmbeddingOutput, FragmentDraft, FragmentId, GeneratedResponse, GenerationRequest,
    GenerationResponse, HealthStatus, IngestReport, KnowledgeFragment, MemoryWindow, NewTurn,
    RawProfile, RetrievalResult, Role, ScoredFragment, SourceField, TokenUsage, UserScope,
};

pub use traits::{
    ConversationStore, EmbeddingAdapter, GenerationAdapter, PluginAdapter, VectorStoreAdapter,
};
