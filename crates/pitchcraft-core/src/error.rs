// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pitchcraft RAG engine.

use strum::{Display, EnumString};
use thiserror::Error;

use crate::types::SourceField;

/// Classification of a failed generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum GenerationFailureKind {
    /// The upstream service throttled the request (HTTP 429).
    RateLimited,
    /// The call exceeded `generation.timeout_secs`.
    Timeout,
    /// The upstream service failed (5xx, transport, malformed body).
    Upstream,
    /// The upstream service refused the request (4xx other than 429).
    Rejected,
    /// The model returned no text.
    EmptyOutput,
    /// The model's text did not have the requested structure.
    MalformedOutput,
}

impl GenerationFailureKind {
    /// Whether a caller may retry the same request later.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout | Self::Upstream)
    }
}

/// The primary error type used across all Pitchcraft adapter traits and core operations.
#[derive(Debug, Error)]
pub enum PitchcraftError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// SQLite errors (connection, migration, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The embedder failed or timed out. `field` is set when the failure
    /// happened while ingesting a specific profile field.
    #[error("embedding unavailable{}: {message}", field_suffix(.field))]
    EmbeddingUnavailable {
        field: Option<SourceField>,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No knowledge fragments exist for the scope.
    #[error("no knowledge found for scope `{scope}`")]
    ScopeNotFound { scope: String },

    /// The generation capability failed.
    #[error("generation failed ({kind}): {message}")]
    GenerationFailed {
        kind: GenerationFailureKind,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The vector store could not be reached or returned garbage.
    #[error("vector store unavailable: {message}")]
    VectorStoreUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Caller-supplied input was rejected (empty scope, query, conversation id).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

fn field_suffix(field: &Option<SourceField>) -> String {
    field
        .map(|f| format!(" for field `{f}`"))
        .unwrap_or_default()
}

impl PitchcraftError {
    /// Wraps any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a generation failure without an underlying source.
    pub fn generation(kind: GenerationFailureKind, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Builds an embedding failure without an underlying source.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingUnavailable {
            field: None,
            message: message.into(),
            source: None,
        }
    }

    /// Builds a vector store failure without an underlying source.
    pub fn vector_store(message: impl Into<String>) -> Self {
        Self::VectorStoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the profile field being ingested to an embedding failure.
    /// Other variants pass through unchanged.
    pub fn for_field(self, field: SourceField) -> Self {
        match self {
            Self::EmbeddingUnavailable {
                message, source, ..
            } => Self::EmbeddingUnavailable {
                field: Some(field),
                message,
                source,
            },
            other => other,
        }
    }

    /// Whether the same request may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingUnavailable { .. } => true,
            Self::GenerationFailed { kind, .. } => kind.is_retryable(),
            _ => false,
        }
    }

    /// A sentence safe to show to an end user.
    ///
    /// Never includes prompt text, fragment text, or upstream response bodies.
    pub fn user_message(&self) -> String {
        match self {
            Self::EmbeddingUnavailable {
                field: Some(field), ..
            } => format!(
                "We could not process your {} right now. Please try again shortly.",
                field.label().to_lowercase()
            ),
            Self::EmbeddingUnavailable { field: None, .. } => {
                "Knowledge lookup is temporarily unavailable. Please try again shortly.".into()
            }
            Self::ScopeNotFound { .. } => {
                "No business profile has been set up yet. Complete onboarding first.".into()
            }
            Self::GenerationFailed {
                kind: GenerationFailureKind::RateLimited,
                ..
            } => "The content service is busy. Please try again in a moment.".into(),
            Self::GenerationFailed { .. } => {
                "Content generation is temporarily unavailable. Please try again shortly.".into()
            }
            Self::VectorStoreUnavailable { .. } => {
                "Knowledge storage is temporarily unavailable. Please try again later.".into()
            }
            Self::InvalidInput(message) => message.clone(),
            Self::Config(_) | Self::Storage { .. } | Self::Internal(_) => {
                "An internal error occurred. Please try again later.".into()
            }
        }
    }
}
