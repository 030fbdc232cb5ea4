// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pitchcraft RAG engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Pitchcraft configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PitchcraftConfig {
    /// Identity, logging and system prompt.
    #[serde(default)]
    pub agent: AgentConfig,

    /// SQLite database settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Vector store backend selection.
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Knowledge retrieval ranking.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation memory windowing.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Prompt assembly budget.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Generation service settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Profile ingestion behavior.
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name used in the shell prompt.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Inline system instruction. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a markdown file containing the system instruction.
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
            system_prompt_file: None,
        }
    }
}

fn default_agent_name() -> String {
    "pitchcraft".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("pitchcraft").join("pitchcraft.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("pitchcraft.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Embedding model configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Name of the ONNX embedding model.
    #[serde(default = "default_embedding_model")]
    pub model_name: String,

    /// Directory the model files are downloaded to.
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    /// Upper bound for a single embed call, in milliseconds.
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,

    /// Vector dimension produced by the model.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: default_embedding_model(),
            model_dir: default_model_dir(),
            timeout_ms: default_embedding_timeout_ms(),
            dimensions: default_dimensions(),
        }
    }
}

fn default_embedding_model() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_model_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("pitchcraft").join("models"))
        .unwrap_or_else(|| std::path::PathBuf::from("models"))
        .to_string_lossy()
        .into_owned()
}

fn default_embedding_timeout_ms() -> u64 {
    5_000
}

fn default_dimensions() -> usize {
    384
}

/// Which vector store implementation backs knowledge fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Embeddings stored in the main SQLite database.
    #[default]
    Sqlite,
    /// A Qdrant server reached over its REST API.
    Qdrant,
}

/// Vector store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,

    /// Qdrant REST endpoint.
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Qdrant collection name.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Qdrant API key. Falls back to the `QDRANT_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Readiness checks at startup before giving up.
    #[serde(default = "default_ready_retries")]
    pub ready_retries: u32,

    /// Delay between readiness checks, in milliseconds.
    #[serde(default = "default_ready_delay_ms")]
    pub ready_delay_ms: u64,

    /// Per-request HTTP timeout, in seconds.
    #[serde(default = "default_vector_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            ready_retries: default_ready_retries(),
            ready_delay_ms: default_ready_delay_ms(),
            timeout_secs: default_vector_timeout_secs(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "marketing_data".to_string()
}

fn default_ready_retries() -> u32 {
    10
}

fn default_ready_delay_ms() -> u64 {
    1_000
}

fn default_vector_timeout_secs() -> u64 {
    10
}

/// Retrieval ranking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Fragments handed to the prompt per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Candidates requested from the store before tie-breaking.
    #[serde(default = "default_candidate_pool")]
    pub candidate_pool: usize,

    /// Minimum cosine similarity for a fragment to be used. `None` keeps all.
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_pool: default_candidate_pool(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_candidate_pool() -> usize {
    20
}

/// Conversation memory windowing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Characters per token for the token estimate.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,

    /// Fixed token charge per turn for role tags and delimiters.
    #[serde(default = "default_per_turn_overhead")]
    pub per_turn_overhead: usize,

    /// Turns loaded per page while walking backwards through a conversation.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Lower clamp for the memory share of the prompt budget.
    #[serde(default = "default_min_window_tokens")]
    pub min_window_tokens: usize,

    /// Upper clamp for the memory share of the prompt budget.
    #[serde(default = "default_max_window_tokens")]
    pub max_window_tokens: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            per_turn_overhead: default_per_turn_overhead(),
            page_size: default_page_size(),
            min_window_tokens: default_min_window_tokens(),
            max_window_tokens: default_max_window_tokens(),
        }
    }
}

fn default_chars_per_token() -> usize {
    4
}

fn default_per_turn_overhead() -> usize {
    4
}

fn default_page_size() -> usize {
    32
}

fn default_min_window_tokens() -> usize {
    256
}

fn default_max_window_tokens() -> usize {
    4_096
}

/// Prompt assembly configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Total estimated tokens for instruction, facts, memory and query.
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            budget_tokens: default_budget_tokens(),
        }
    }
}

fn default_budget_tokens() -> usize {
    8_192
}

/// Generation service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationConfig {
    /// Gemini API key. Falls back to the `GEMINI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for `generateContent`.
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Base URL of the Generative Language API.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// Maximum tokens in a generated answer.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Sampling temperature. `None` uses the model default.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Upper bound for one generation call including retries, in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for throttled or failed upstream calls.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_generation_model(),
            base_url: default_generation_base_url(),
            max_output_tokens: default_max_output_tokens(),
            temperature: None,
            timeout_secs: default_generation_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_generation_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_generation_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_max_output_tokens() -> u32 {
    1_024
}

fn default_generation_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

/// Profile ingestion configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionConfig {
    /// Re-embed and rewrite fields even when their text is unchanged.
    #[serde(default)]
    pub force_reembed: bool,
}
