// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the ingestion, retrieval, memory and generation layers.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

use crate::error::PitchcraftError;

/// Opaque tenant identifier. All knowledge reads and writes are scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserScope(String);

impl UserScope {
    /// Validates and wraps a scope. Empty or whitespace-only scopes are rejected.
    pub fn new(scope: impl Into<String>) -> Result<Self, PitchcraftError> {
        let scope = scope.into();
        if scope.trim().is_empty() {
            return Err(PitchcraftError::InvalidInput(
                "user scope must not be empty".into(),
            ));
        }
        Ok(Self(scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Result<Self, PitchcraftError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(PitchcraftError::InvalidInput(
                "conversation id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Onboarding field a knowledge fragment was extracted from.
///
/// Declaration order is the canonical fragment order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SourceField {
    CompanyName,
    Product,
    Audience,
    Industry,
    Goals,
    Tone,
    Derived,
}

impl SourceField {
    pub const ALL: [SourceField; 7] = [
        SourceField::CompanyName,
        SourceField::Product,
        SourceField::Audience,
        SourceField::Industry,
        SourceField::Goals,
        SourceField::Tone,
        SourceField::Derived,
    ];

    /// Human-readable label used as the fragment text prefix.
    pub fn label(self) -> &'static str {
        match self {
            SourceField::CompanyName => "Company name",
            SourceField::Product => "Product",
            SourceField::Audience => "Audience",
            SourceField::Industry => "Industry",
            SourceField::Goals => "Goals",
            SourceField::Tone => "Tone of voice",
            SourceField::Derived => "Business notes",
        }
    }

    /// Stable storage key (`company_name`, `product`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            SourceField::CompanyName => "company_name",
            SourceField::Product => "product",
            SourceField::Audience => "audience",
            SourceField::Industry => "industry",
            SourceField::Goals => "goals",
            SourceField::Tone => "tone",
            SourceField::Derived => "derived",
        }
    }
}

/// Stable fragment identifier derived from `(scope, field)`.
///
/// The first 16 bytes of `SHA-256(scope || 0x00 || field)` rendered as a
/// hyphenated UUID, so it is also a valid Qdrant point id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FragmentId(String);

impl FragmentId {
    pub fn derive(scope: &UserScope, field: SourceField) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(field.as_str().as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);
        Self(uuid::Uuid::from_bytes(bytes).hyphenated().to_string())
    }

    /// Wraps an id read back from a store.
    pub fn from_stored(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw onboarding input: field name to free-text value.
///
/// Keys are kept sorted so alias resolution is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawProfile(BTreeMap<String, String>);

impl RawProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawProfile {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A fragment produced by the extractor, not yet embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentDraft {
    pub scope: UserScope,
    pub source_field: SourceField,
    pub text: String,
}

impl FragmentDraft {
    pub fn id(&self) -> FragmentId {
        FragmentId::derive(&self.scope, self.source_field)
    }
}

/// A draft paired with its embedding, ready for upsert.
#[derive(Debug, Clone)]
pub struct EmbeddedFragment {
    pub draft: FragmentDraft,
    pub embedding: Vec<f32>,
}

/// A persisted knowledge fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeFragment {
    pub id: FragmentId,
    pub scope: UserScope,
    pub source_field: SourceField,
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    /// RFC 3339 time the current version was written.
    pub created_at: String,
    /// Starts at 1, incremented by the store on every overwrite.
    pub version: u64,
}

/// A fragment with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredFragment {
    pub fragment: KnowledgeFragment,
    pub score: f32,
}

/// Ordered retrieval output, highest score first.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub scope: UserScope,
    pub fragments: Vec<ScoredFragment>,
}

impl RetrievalResult {
    pub fn empty(scope: UserScope) -> Self {
        Self {
            scope,
            fragments: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn ids(&self) -> Vec<FragmentId> {
        self.fragments.iter().map(|s| s.fragment.id.clone()).collect()
    }
}

/// Outcome of one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub created: Vec<SourceField>,
    pub updated: Vec<SourceField>,
    pub unchanged: Vec<SourceField>,
    /// Raw field names that were empty, unrecognized, or shadowed by an alias.
    pub skipped: Vec<String>,
}

impl IngestReport {
    /// Number of fragments written by the call.
    pub fn count(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Speaker of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One immutable entry of a conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub conversation_id: ConversationId,
    /// Strictly increasing and gap-free within a conversation, starting at 1.
    pub sequence_number: u64,
    pub role: Role,
    pub text: String,
    pub created_at: String,
}

/// A turn to be appended; the store assigns the sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: Role,
    pub text: String,
}

impl NewTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// The most recent turns that fit a token budget. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryWindow {
    /// Oldest to newest.
    pub turns: Vec<ConversationTurn>,
    /// Older turns left out of the window.
    pub omitted: u64,
    /// Whether the newest turn was cut to fit.
    pub truncated: bool,
    pub estimated_tokens: usize,
}

impl MemoryWindow {
    pub fn empty(omitted: u64) -> Self {
        Self {
            turns: Vec::new(),
            omitted,
            truncated: false,
            estimated_tokens: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

/// Result of one grounded generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedResponse {
    pub conversation_id: ConversationId,
    pub text: String,
    pub user_sequence: u64,
    pub assistant_sequence: u64,
    /// False when the scope had no knowledge and the answer is ungrounded.
    pub grounded: bool,
    pub fragment_ids: Vec<FragmentId>,
}

/// Input to an embedding adapter.
#[derive(Debug, Clone)]
pub struct EmbeddingInput {
    pub texts: Vec<String>,
}

/// Output from an embedding adapter, one vector per input text.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

/// Input to a generation adapter.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
}

/// Token accounting reported by a generation adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Output of a generation adapter.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub text: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Embedding,
    VectorStore,
    Generation,
    Storage,
}
