// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete engine with mock embedding and
//! generation adapters over a temp SQLite database holding both the
//! conversation log and the knowledge fragments.

use std::sync::Arc;

use pitchcraft_config::PitchcraftConfig;
use pitchcraft_config::model::StorageConfig;
use pitchcraft_core::{
    ConversationId, GeneratedResponse, IngestReport, PitchcraftError, RawProfile, UserScope,
};
use pitchcraft_engine::{Engine, EngineParts};
use pitchcraft_knowledge::SqliteVectorStore;
use pitchcraft_storage::SqliteStorage;

use crate::mock_embedder::MockEmbedder;
use crate::mock_generator::MockGenerator;

type ConfigOverride = Box<dyn FnOnce(&mut PitchcraftConfig) + Send>;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    dimensions: usize,
    system_prompt: Option<String>,
    overrides: Vec<ConfigOverride>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            dimensions: 32,
            system_prompt: None,
            overrides: Vec::new(),
        }
    }

    /// Set mock generator responses.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    /// Set the mock embedder's vector size (also written to the config).
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Adjust the config after the harness defaults are applied.
    pub fn with_config(
        mut self,
        edit: impl FnOnce(&mut PitchcraftConfig) + Send + 'static,
    ) -> Self {
        self.overrides.push(Box::new(edit));
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, PitchcraftError> {
        let temp_dir = tempfile::TempDir::new().map_err(PitchcraftError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = PitchcraftConfig {
            storage: StorageConfig {
                database_path: db_path.to_string_lossy().to_string(),
                wal_mode: true,
            },
            ..PitchcraftConfig::default()
        };
        config.agent.system_prompt = self
            .system_prompt
            .or(Some("You are a test marketing assistant.".to_string()));
        config.embedding.dimensions = self.dimensions;
        for edit in self.overrides {
            edit(&mut config);
        }

        let storage = Arc::new(SqliteStorage::open(&config.storage).await?);
        let vector_store = Arc::new(SqliteVectorStore::new(storage.database().clone()));
        let embedder = Arc::new(MockEmbedder::new(self.dimensions));
        let generator = Arc::new(MockGenerator::with_responses(self.responses));

        let engine = Engine::new(
            &config,
            EngineParts {
                embedder: embedder.clone(),
                vector_store: vector_store.clone(),
                generator: generator.clone(),
                conversations: storage.clone(),
            },
        )
        .await?;

        Ok(TestHarness {
            engine,
            embedder,
            generator,
            storage,
            vector_store,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock adapters and temp storage.
pub struct TestHarness {
    pub engine: Engine,
    pub embedder: Arc<MockEmbedder>,
    pub generator: Arc<MockGenerator>,
    /// Conversation store (temp DB, cleaned up on drop).
    pub storage: Arc<SqliteStorage>,
    /// Knowledge store sharing the same database.
    pub vector_store: Arc<SqliteVectorStore>,
    pub config: PitchcraftConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Ingest `pairs` for `scope`.
    pub async fn ingest(
        &self,
        scope: &str,
        pairs: &[(&str, &str)],
    ) -> Result<IngestReport, PitchcraftError> {
        let profile: RawProfile = pairs.iter().copied().collect();
        self.engine.ingest(&UserScope::new(scope)?, &profile).await
    }

    /// Run one generation for `scope` in `conversation`.
    pub async fn ask(
        &self,
        scope: &str,
        conversation: &str,
        query: &str,
    ) -> Result<GeneratedResponse, PitchcraftError> {
        self.engine
            .generate(
                &UserScope::new(scope)?,
                &ConversationId::new(conversation)?,
                query,
            )
            .await
    }

    /// Add a response to the mock generator's queue.
    pub async fn add_generator_response(&self, text: impl Into<String>) {
        self.generator.push_response(text).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harness_builds_and_answers() {
        let harness = TestHarness::builder()
            .with_mock_responses(vec!["We sell rockets.".into()])
            .build()
            .await
            .unwrap();

        let report = harness
            .ingest("acme", &[("company_name", "Acme"), ("product", "Rockets")])
            .await
            .unwrap();
        assert_eq!(report.created.len(), 2);

        let response = harness.ask("acme", "c1", "What do we sell?").await.unwrap();
        assert_eq!(response.text, "We sell rockets.");
        assert!(response.grounded);
    }

    #[tokio::test]
    async fn config_overrides_apply() {
        let harness = TestHarness::builder()
            .with_config(|config| config.retrieval.top_k = 1)
            .build()
            .await
            .unwrap();
        assert_eq!(harness.config.retrieval.top_k, 1);
    }
}
