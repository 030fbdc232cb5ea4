// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter wiring shared by the subcommands.

use std::sync::Arc;

use pitchcraft_config::{PitchcraftConfig, VectorBackend};
use pitchcraft_core::{EmbeddingAdapter, PitchcraftError, VectorStoreAdapter};
use pitchcraft_engine::{Engine, EngineParts};
use pitchcraft_gemini::GeminiGenerator;
use pitchcraft_knowledge::{IngestionPipeline, SqliteVectorStore};
use pitchcraft_storage::SqliteStorage;
use tracing::info;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the config.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pitchcraft={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn open_storage(config: &PitchcraftConfig) -> Result<Arc<SqliteStorage>, PitchcraftError> {
    Ok(Arc::new(SqliteStorage::open(&config.storage).await?))
}

pub async fn open_embedder(
    config: &PitchcraftConfig,
) -> Result<Arc<dyn EmbeddingAdapter>, PitchcraftError> {
    #[cfg(feature = "onnx")]
    {
        let embedder = pitchcraft_embedding::OnnxEmbedder::from_config(&config.embedding).await?;
        Ok(Arc::new(embedder))
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = config;
        Err(PitchcraftError::Config(
            "this build has no embedding backend (enable the `onnx` feature)".into(),
        ))
    }
}

pub async fn open_vector_store(
    config: &PitchcraftConfig,
    storage: &SqliteStorage,
) -> Result<Arc<dyn VectorStoreAdapter>, PitchcraftError> {
    match config.vector_store.backend {
        VectorBackend::Sqlite => Ok(Arc::new(SqliteVectorStore::new(storage.database().clone()))),
        #[cfg(feature = "qdrant")]
        VectorBackend::Qdrant => Ok(Arc::new(
            pitchcraft_qdrant::QdrantStore::connect(&config.vector_store, config.embedding.dimensions)
                .await?,
        )),
        #[cfg(not(feature = "qdrant"))]
        VectorBackend::Qdrant => Err(PitchcraftError::Config(
            "vector_store.backend = \"qdrant\" requires the `qdrant` feature".into(),
        )),
    }
}

/// Everything ingestion needs; no generation key required.
pub async fn build_ingestion(
    config: &PitchcraftConfig,
) -> Result<IngestionPipeline, PitchcraftError> {
    let storage = open_storage(config).await?;
    let vector_store = open_vector_store(config, &storage).await?;
    let embedder = open_embedder(config).await?;
    Ok(IngestionPipeline::new(
        embedder,
        vector_store,
        &config.embedding,
        &config.ingestion,
    ))
}

/// The full engine over the configured adapters.
pub async fn build_engine(config: &PitchcraftConfig) -> Result<Engine, PitchcraftError> {
    let generator = Arc::new(GeminiGenerator::new(&config.generation)?);
    let storage = open_storage(config).await?;
    let vector_store = open_vector_store(config, &storage).await?;
    let embedder = open_embedder(config).await?;

    let engine = Engine::new(
        config,
        EngineParts {
            embedder,
            vector_store,
            generator,
            conversations: storage,
        },
    )
    .await?;
    info!(
        backend = ?config.vector_store.backend,
        model = config.generation.model.as_str(),
        "pitchcraft engine initialized"
    );
    Ok(engine)
}
