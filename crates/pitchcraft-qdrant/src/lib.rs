// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Qdrant vector store adapter for Pitchcraft.
//!
//! Talks to Qdrant's REST API. One collection holds every tenant's
//! fragments; a keyword payload index on `user_scope` backs the `must` filter
//! that every scoped query carries.

pub mod client;
pub mod types;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pitchcraft_config::model::VectorStoreConfig;
use pitchcraft_core::{
    AdapterType, EmbeddedFragment, FragmentId, HealthStatus, KnowledgeFragment, PitchcraftError,
    PluginAdapter, ScoredFragment, UserScope, VectorStoreAdapter,
};
use tracing::{debug, info, warn};

use crate::client::QdrantClient;
use crate::types::{FragmentPayload, PointStruct, UpsertPoints, point_id, scope_filter};

/// Environment variable consulted when `vector_store.api_key` is unset.
pub const API_KEY_ENV: &str = "QDRANT_API_KEY";

const SCROLL_PAGE: usize = 256;

pub struct QdrantStore {
    client: QdrantClient,
}

impl QdrantStore {
    /// Connects, waits for readiness and ensures the collection and its
    /// scope index exist.
    pub async fn connect(
        config: &VectorStoreConfig,
        dimensions: usize,
    ) -> Result<Self, PitchcraftError> {
        let api_key = resolve_api_key(&config.api_key);
        let client = QdrantClient::new(
            &config.url,
            &config.collection,
            api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        client
            .wait_for_ready(config.ready_retries, Duration::from_millis(config.ready_delay_ms))
            .await?;

        let store = Self { client };
        store.ensure_collection(dimensions).await?;
        info!(
            url = config.url.as_str(),
            collection = config.collection.as_str(),
            dimensions,
            "Qdrant vector store ready"
        );
        Ok(store)
    }

    pub fn with_client(client: QdrantClient) -> Self {
        Self { client }
    }

    async fn ensure_collection(&self, dimensions: usize) -> Result<(), PitchcraftError> {
        match self.client.collection_vector_size().await? {
            None => self.client.create_collection(dimensions).await?,
            Some(existing) if existing != dimensions => {
                return Err(PitchcraftError::Config(format!(
                    "Qdrant collection `{}` holds {existing}-dimensional vectors but the \
                     embedder produces {dimensions}",
                    self.client.collection()
                )));
            }
            Some(_) => {}
        }
        self.client.create_scope_index().await
    }
}

/// Config key, then `QDRANT_API_KEY`; Qdrant may also run without one.
pub fn resolve_api_key(config_key: &Option<String>) -> Option<String> {
    config_key
        .clone()
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty()))
}

fn to_fragment(
    id: &serde_json::Value,
    payload: FragmentPayload,
    embedding: Vec<f32>,
) -> Result<KnowledgeFragment, PitchcraftError> {
    Ok(KnowledgeFragment {
        id: FragmentId::from_stored(point_id(id)),
        scope: UserScope::new(payload.user_scope)?,
        source_field: payload.source_field,
        text: payload.text,
        embedding,
        created_at: payload.created_at,
        version: payload.version,
    })
}

#[async_trait]
impl PluginAdapter for QdrantStore {
    fn name(&self) -> &str {
        "qdrant"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        match self.client.ready().await {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStoreAdapter for QdrantStore {
    async fn upsert(
        &self,
        fragments: &[EmbeddedFragment],
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = fragments
            .iter()
            .map(|f| f.draft.id().as_str().to_string())
            .collect();
        let current: HashMap<String, u64> = self
            .client
            .retrieve(&ids)
            .await?
            .into_iter()
            .filter_map(|record| Some((point_id(&record.id), record.payload?.version)))
            .collect();

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut stored = Vec::with_capacity(fragments.len());
        let mut points = Vec::with_capacity(fragments.len());
        for (fragment, id) in fragments.iter().zip(ids) {
            let version = current.get(&id).map_or(1, |v| v + 1);
            let draft = &fragment.draft;
            points.push(PointStruct {
                id: id.clone(),
                vector: fragment.embedding.clone(),
                payload: FragmentPayload {
                    user_scope: draft.scope.as_str().to_string(),
                    source_field: draft.source_field,
                    text: draft.text.clone(),
                    created_at: created_at.clone(),
                    version,
                },
            });
            stored.push(KnowledgeFragment {
                id: FragmentId::from_stored(id),
                scope: draft.scope.clone(),
                source_field: draft.source_field,
                text: draft.text.clone(),
                embedding: fragment.embedding.clone(),
                created_at: created_at.clone(),
                version,
            });
        }

        self.client.upsert(&UpsertPoints { points }).await?;
        debug!(count = stored.len(), "fragments upserted to Qdrant");
        Ok(stored)
    }

    async fn search(
        &self,
        scope: &UserScope,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredFragment>, PitchcraftError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = self
            .client
            .search(vector, scope_filter(scope.as_str()), k)
            .await?;

        let mut scored = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(payload) = hit.payload else {
                warn!(id = %point_id(&hit.id), "search hit without payload skipped");
                continue;
            };
            scored.push(ScoredFragment {
                fragment: to_fragment(&hit.id, payload, Vec::new())?,
                score: hit.score,
            });
        }
        Ok(scored)
    }

    async fn fragments_for_scope(
        &self,
        scope: &UserScope,
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
        let mut fragments = Vec::new();
        let mut offset = None;
        loop {
            let page = self
                .client
                .scroll(scope_filter(scope.as_str()), offset, SCROLL_PAGE)
                .await?;
            for record in page.points {
                if let Some(payload) = record.payload {
                    fragments.push(to_fragment(
                        &record.id,
                        payload,
                        record.vector.unwrap_or_default(),
                    )?);
                }
            }
            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        fragments.sort_by_key(|f| f.source_field);
        Ok(fragments)
    }

    async fn count(&self, scope: &UserScope) -> Result<u64, PitchcraftError> {
        self.client.count(scope_filter(scope.as_str())).await
    }

    async fn delete(&self, id: &FragmentId) -> Result<bool, PitchcraftError> {
        let ids = vec![id.as_str().to_string()];
        if self.client.retrieve(&ids).await?.is_empty() {
            return Ok(false);
        }
        self.client.delete(&ids).await?;
        Ok(true)
    }
}
