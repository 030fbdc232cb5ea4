// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine facade for the Pitchcraft RAG engine.
//!
//! [`Engine`] wires the capability adapters into an ingestion pipeline and a
//! generation orchestrator. Its two core operations are [`Engine::ingest`]
//! and [`Engine::generate`]. [`Engine::discovery_questions`] drafts research
//! questions from a profile; the rest are read accessors for the CLI.

pub mod discovery;
pub mod instruction;
pub mod orchestrator;
pub mod prompt;

use std::sync::Arc;

use pitchcraft_config::PitchcraftConfig;
use pitchcraft_core::{
    AdapterType, ConversationId, ConversationStore, ConversationTurn, EmbeddingAdapter,
    GeneratedResponse, GenerationAdapter, HealthStatus, IngestReport, KnowledgeFragment,
    PitchcraftError, PluginAdapter, RawProfile, SourceField, UserScope, VectorStoreAdapter,
};
use pitchcraft_knowledge::{IngestionPipeline, Retriever};
use pitchcraft_memory::ConversationMemory;
use tracing::{info, warn};

pub use discovery::DiscoveryPlanner;
pub use instruction::load_system_prompt;
pub use orchestrator::{GenerationOrchestrator, GenerationStage};
pub use prompt::PromptBuilder;

/// The capability adapters an [`Engine`] runs on.
pub struct EngineParts {
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub vector_store: Arc<dyn VectorStoreAdapter>,
    pub generator: Arc<dyn GenerationAdapter>,
    pub conversations: Arc<dyn ConversationStore>,
}

/// Health of one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterHealth {
    pub name: String,
    pub adapter_type: AdapterType,
    pub status: HealthStatus,
}

pub struct Engine {
    ingestion: IngestionPipeline,
    orchestrator: GenerationOrchestrator,
    discovery: DiscoveryPlanner,
    memory: Arc<ConversationMemory>,
    vector_store: Arc<dyn VectorStoreAdapter>,
    adapters: Vec<Arc<dyn PluginAdapter>>,
}

impl Engine {
    pub async fn new(config: &PitchcraftConfig, parts: EngineParts) -> Result<Self, PitchcraftError> {
        let embedded_dims = parts.embedder.dimensions();
        if embedded_dims != config.embedding.dimensions {
            return Err(PitchcraftError::Config(format!(
                "embedder `{}` produces {embedded_dims}-dimensional vectors but \
                 embedding.dimensions is {}",
                parts.embedder.name(),
                config.embedding.dimensions
            )));
        }

        let instruction = load_system_prompt(&config.agent).await;
        let memory = Arc::new(ConversationMemory::new(
            parts.conversations.clone(),
            &config.memory,
        ));
        let ingestion = IngestionPipeline::new(
            parts.embedder.clone(),
            parts.vector_store.clone(),
            &config.embedding,
            &config.ingestion,
        );
        let retriever = Retriever::new(
            parts.embedder.clone(),
            parts.vector_store.clone(),
            &config.embedding,
            &config.retrieval,
        );
        let prompt = PromptBuilder::new(instruction, &config.prompt, &config.memory);
        let discovery = DiscoveryPlanner::new(
            parts.vector_store.clone(),
            parts.generator.clone(),
            prompt.clone(),
            &config.generation,
        );
        let orchestrator = GenerationOrchestrator::new(
            retriever,
            memory.clone(),
            parts.generator.clone(),
            prompt,
            &config.retrieval,
            &config.generation,
        );

        let adapters: Vec<Arc<dyn PluginAdapter>> = vec![
            parts.embedder as Arc<dyn PluginAdapter>,
            parts.vector_store.clone() as Arc<dyn PluginAdapter>,
            parts.generator as Arc<dyn PluginAdapter>,
            parts.conversations as Arc<dyn PluginAdapter>,
        ];
        info!(
            adapters = ?adapters.iter().map(|a| a.name().to_string()).collect::<Vec<_>>(),
            "engine ready"
        );

        Ok(Self {
            ingestion,
            orchestrator,
            discovery,
            memory,
            vector_store: parts.vector_store,
            adapters,
        })
    }

    /// Turns a raw onboarding submission into knowledge fragments for `scope`.
    pub async fn ingest(
        &self,
        scope: &UserScope,
        profile: &RawProfile,
    ) -> Result<IngestReport, PitchcraftError> {
        self.ingestion.ingest(scope, profile).await
    }

    /// Produces a grounded reply and records the exchange.
    pub async fn generate(
        &self,
        scope: &UserScope,
        conversation_id: &ConversationId,
        query: &str,
    ) -> Result<GeneratedResponse, PitchcraftError> {
        self.orchestrator.generate(scope, conversation_id, query).await
    }

    /// Research questions derived from the scope's whole profile. Stateless.
    pub async fn discovery_questions(
        &self,
        scope: &UserScope,
    ) -> Result<Vec<String>, PitchcraftError> {
        self.discovery.questions(scope).await
    }

    pub async fn history(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError> {
        self.memory.turns(conversation_id).await
    }

    pub async fn knowledge(
        &self,
        scope: &UserScope,
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
        self.vector_store.fragments_for_scope(scope).await
    }

    pub async fn forget(
        &self,
        scope: &UserScope,
        field: SourceField,
    ) -> Result<bool, PitchcraftError> {
        self.ingestion.forget(scope, field).await
    }

    /// Health of every adapter. A failing check is reported as unhealthy.
    pub async fn health(&self) -> Vec<AdapterHealth> {
        let mut report = Vec::with_capacity(self.adapters.len());
        for adapter in &self.adapters {
            let status = adapter
                .health_check()
                .await
                .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
            report.push(AdapterHealth {
                name: adapter.name().to_string(),
                adapter_type: adapter.adapter_type(),
                status,
            });
        }
        report
    }

    /// Shuts every adapter down, logging failures.
    pub async fn shutdown(&self) {
        for adapter in &self.adapters {
            if let Err(e) = adapter.shutdown().await {
                warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchcraft_knowledge::SqliteVectorStore;
    use pitchcraft_storage::{Database, SqliteStorage};
    use pitchcraft_test_utils::{MockEmbedder, MockGenerator};

    async fn engine(
        embedder_dims: usize,
        config: PitchcraftConfig,
    ) -> Result<Engine, PitchcraftError> {
        let db = Database::open_in_memory().await?;
        Engine::new(
            &config,
            EngineParts {
                embedder: Arc::new(MockEmbedder::new(embedder_dims)),
                vector_store: Arc::new(SqliteVectorStore::new(db.clone())),
                generator: Arc::new(MockGenerator::new()),
                conversations: Arc::new(SqliteStorage::new(db)),
            },
        )
        .await
    }

    fn config(dims: usize) -> PitchcraftConfig {
        let mut config = PitchcraftConfig::default();
        config.embedding.dimensions = dims;
        config
    }

    #[tokio::test]
    async fn health_covers_every_adapter() {
        let engine = engine(16, config(16)).await.unwrap();
        let health = engine.health().await;
        assert_eq!(health.len(), 4);
        assert!(health.iter().all(|h| h.status == HealthStatus::Healthy));
        assert!(
            health
                .iter()
                .any(|h| h.adapter_type == AdapterType::Generation)
        );
    }

    #[tokio::test]
    async fn forget_removes_one_field() {
        let engine = engine(16, config(16)).await.unwrap();
        let scope = UserScope::new("acme").unwrap();
        let profile: RawProfile = [("company_name", "Acme"), ("product", "Rockets")]
            .into_iter()
            .collect();
        engine.ingest(&scope, &profile).await.unwrap();

        assert!(engine.forget(&scope, SourceField::Product).await.unwrap());
        assert!(!engine.forget(&scope, SourceField::Product).await.unwrap());

        let left = engine.knowledge(&scope).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].source_field, SourceField::CompanyName);
    }

    #[tokio::test]
    async fn history_is_chronological() {
        let engine = engine(16, config(16)).await.unwrap();
        let scope = UserScope::new("acme").unwrap();
        let cid = ConversationId::new("c1").unwrap();
        engine.generate(&scope, &cid, "one").await.unwrap();
        engine.generate(&scope, &cid, "two").await.unwrap();

        let history = engine.history(&cid).await.unwrap();
        let sequences: Vec<u64> = history.iter().map(|t| t.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
        assert_eq!(history[2].text, "two");
    }

    #[tokio::test]
    async fn dimension_mismatch_is_a_config_error() {
        let err = engine(8, config(16)).await.err().expect("mismatch must fail");
        assert!(matches!(err, PitchcraftError::Config(_)));
    }
}
