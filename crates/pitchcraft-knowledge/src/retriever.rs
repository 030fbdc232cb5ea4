// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped top-K retrieval over knowledge fragments.
//!
//! The query is embedded, the store is asked for a candidate pool wider than
//! K, and the pool is re-ranked with a deterministic tie-break before being
//! cut to K.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use pitchcraft_config::model::{EmbeddingConfig, RetrievalConfig};
use pitchcraft_core::{
    EmbeddingAdapter, EmbeddingInput, PitchcraftError, RetrievalResult, ScoredFragment, UserScope,
    VectorStoreAdapter,
};
use tracing::{debug, error};

pub struct Retriever {
    embedder: Arc<dyn EmbeddingAdapter>,
    store: Arc<dyn VectorStoreAdapter>,
    embed_timeout: Duration,
    candidate_pool: usize,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingAdapter>,
        store: Arc<dyn VectorStoreAdapter>,
        embedding: &EmbeddingConfig,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            embed_timeout: Duration::from_millis(embedding.timeout_ms),
            candidate_pool: retrieval.candidate_pool,
            min_score: retrieval.min_score,
        }
    }

    /// Up to `k` fragments of `scope` most similar to `query`.
    ///
    /// Returns [`PitchcraftError::ScopeNotFound`] when the scope holds no
    /// fragments at all, which callers may treat as "answer ungrounded".
    pub async fn retrieve(
        &self,
        scope: &UserScope,
        query: &str,
        k: usize,
    ) -> Result<RetrievalResult, PitchcraftError> {
        if k == 0 {
            return Ok(RetrievalResult::empty(scope.clone()));
        }
        if query.trim().is_empty() {
            return Err(PitchcraftError::InvalidInput("query must not be empty".into()));
        }
        if self.store.count(scope).await? == 0 {
            return Err(PitchcraftError::ScopeNotFound {
                scope: scope.to_string(),
            });
        }

        let vector = self.embed_query(query).await?;
        let pool = k.max(self.candidate_pool);
        let candidates = self.store.search(scope, &vector, pool).await?;
        let fetched = candidates.len();

        let mut ranked: Vec<ScoredFragment> = candidates
            .into_iter()
            .filter(|hit| {
                if hit.fragment.scope != *scope {
                    error!(
                        requested = %scope,
                        returned = %hit.fragment.scope,
                        id = %hit.fragment.id,
                        "vector store returned a fragment from another scope"
                    );
                    return false;
                }
                true
            })
            .filter(|hit| self.min_score.is_none_or(|min| hit.score >= min))
            .collect();
        ranked.sort_by(rank);
        ranked.truncate(k);

        debug!(scope = %scope, k, pool, fetched, returned = ranked.len(), "retrieval complete");
        Ok(RetrievalResult {
            scope: scope.clone(),
            fragments: ranked,
        })
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, PitchcraftError> {
        let input = EmbeddingInput {
            texts: vec![query.to_string()],
        };
        let output = tokio::time::timeout(self.embed_timeout, self.embedder.embed(input))
            .await
            .map_err(|_| {
                PitchcraftError::embedding(format!(
                    "query embedding timed out after {:?}",
                    self.embed_timeout
                ))
            })??;
        output
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PitchcraftError::embedding("embedder returned no vector for query"))
    }
}

/// Score descending, then newest `created_at`, then highest version, then id.
fn rank(a: &ScoredFragment, b: &ScoredFragment) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.fragment.created_at.cmp(&a.fragment.created_at))
        .then_with(|| b.fragment.version.cmp(&a.fragment.version))
        .then_with(|| a.fragment.id.cmp(&b.fragment.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestionPipeline;
    use crate::store::SqliteVectorStore;
    use async_trait::async_trait;
    use pitchcraft_config::model::IngestionConfig;
    use pitchcraft_core::{
        AdapterType, EmbeddedFragment, FragmentId, HealthStatus, KnowledgeFragment,
        PluginAdapter, RawProfile, SourceField,
    };
    use pitchcraft_storage::Database;
    use pitchcraft_test_utils::MockEmbedder;
    use proptest::prelude::*;

    fn scope(s: &str) -> UserScope {
        UserScope::new(s).unwrap()
    }

    fn fragment(scope_name: &str, field: SourceField, created_at: &str, version: u64) -> KnowledgeFragment {
        let scope = scope(scope_name);
        KnowledgeFragment {
            id: FragmentId::derive(&scope, field),
            scope,
            source_field: field,
            text: format!("{}: x", field.label()),
            embedding: vec![1.0],
            created_at: created_at.to_string(),
            version,
        }
    }

    /// A store that returns a fixed candidate list regardless of scope.
    struct CannedStore {
        hits: Vec<ScoredFragment>,
    }

    #[async_trait]
    impl PluginAdapter for CannedStore {
        fn name(&self) -> &str {
            "canned"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::VectorStore
        }
        async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), PitchcraftError> {
            Ok(())
        }
    }

    #[async_trait]
    impl VectorStoreAdapter for CannedStore {
        async fn upsert(
            &self,
            _: &[EmbeddedFragment],
        ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
            Ok(Vec::new())
        }
        async fn search(
            &self,
            _: &UserScope,
            _: &[f32],
            k: usize,
        ) -> Result<Vec<ScoredFragment>, PitchcraftError> {
            Ok(self.hits.iter().take(k).cloned().collect())
        }
        async fn fragments_for_scope(
            &self,
            _: &UserScope,
        ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
            Ok(self.hits.iter().map(|h| h.fragment.clone()).collect())
        }
        async fn count(&self, _: &UserScope) -> Result<u64, PitchcraftError> {
            Ok(self.hits.len() as u64)
        }
        async fn delete(&self, _: &FragmentId) -> Result<bool, PitchcraftError> {
            Ok(false)
        }
    }

    fn retriever(store: Arc<dyn VectorStoreAdapter>, embedder: Arc<MockEmbedder>) -> Retriever {
        Retriever::new(
            embedder,
            store,
            &EmbeddingConfig {
                timeout_ms: 200,
                ..EmbeddingConfig::default()
            },
            &RetrievalConfig::default(),
        )
    }

    #[tokio::test]
    async fn ties_break_on_freshness_then_version_then_id() {
        let hits = vec![
            ScoredFragment {
                fragment: fragment("acme", SourceField::Goals, "2026-01-01T00:00:00.000Z", 1),
                score: 0.5,
            },
            ScoredFragment {
                fragment: fragment("acme", SourceField::Tone, "2026-03-01T00:00:00.000Z", 1),
                score: 0.5,
            },
            ScoredFragment {
                fragment: fragment("acme", SourceField::Product, "2026-01-01T00:00:00.000Z", 4),
                score: 0.5,
            },
            ScoredFragment {
                fragment: fragment("acme", SourceField::Industry, "2025-01-01T00:00:00.000Z", 1),
                score: 0.9,
            },
        ];
        let r = retriever(
            Arc::new(CannedStore { hits }),
            Arc::new(MockEmbedder::new(4)),
        );
        let result = r.retrieve(&scope("acme"), "anything", 3).await.unwrap();
        let fields: Vec<SourceField> = result
            .fragments
            .iter()
            .map(|s| s.fragment.source_field)
            .collect();
        assert_eq!(
            fields,
            vec![SourceField::Industry, SourceField::Tone, SourceField::Product]
        );
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn foreign_scope_results_are_dropped_and_logged() {
        let hits = vec![
            ScoredFragment {
                fragment: fragment("globex", SourceField::Product, "2026-01-01T00:00:00.000Z", 1),
                score: 0.99,
            },
            ScoredFragment {
                fragment: fragment("acme", SourceField::Product, "2026-01-01T00:00:00.000Z", 1),
                score: 0.4,
            },
        ];
        let r = retriever(
            Arc::new(CannedStore { hits }),
            Arc::new(MockEmbedder::new(4)),
        );
        let result = r.retrieve(&scope("acme"), "rockets", 5).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.fragments[0].fragment.scope, scope("acme"));
        assert!(logs_contain("another scope"));
    }

    #[tokio::test]
    async fn k_zero_skips_the_embedder() {
        let embedder = Arc::new(MockEmbedder::new(4));
        let r = retriever(Arc::new(CannedStore { hits: vec![] }), embedder.clone());
        let result = r.retrieve(&scope("acme"), "q", 0).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_scope_is_not_found() {
        let r = retriever(
            Arc::new(CannedStore { hits: vec![] }),
            Arc::new(MockEmbedder::new(4)),
        );
        let err = r.retrieve(&scope("nobody"), "q", 3).await.unwrap_err();
        assert!(matches!(err, PitchcraftError::ScopeNotFound { .. }));
    }

    #[tokio::test]
    async fn min_score_filters_weak_hits() {
        let hits = vec![
            ScoredFragment {
                fragment: fragment("acme", SourceField::Product, "2026-01-01T00:00:00.000Z", 1),
                score: 0.8,
            },
            ScoredFragment {
                fragment: fragment("acme", SourceField::Tone, "2026-01-01T00:00:00.000Z", 1),
                score: 0.1,
            },
        ];
        let r = Retriever::new(
            Arc::new(MockEmbedder::new(4)),
            Arc::new(CannedStore { hits }),
            &EmbeddingConfig::default(),
            &RetrievalConfig {
                min_score: Some(0.5),
                ..RetrievalConfig::default()
            },
        );
        let result = r.retrieve(&scope("acme"), "q", 5).await.unwrap();
        assert_eq!(result.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_query_embedding_is_unavailable() {
        let hits = vec![ScoredFragment {
            fragment: fragment("acme", SourceField::Product, "2026-01-01T00:00:00.000Z", 1),
            score: 0.8,
        }];
        let embedder = Arc::new(MockEmbedder::new(4));
        embedder.set_delay(Duration::from_secs(10));
        let r = retriever(Arc::new(CannedStore { hits }), embedder);
        let err = r.retrieve(&scope("acme"), "q", 1).await.unwrap_err();
        assert!(matches!(
            err,
            PitchcraftError::EmbeddingUnavailable { field: None, .. }
        ));
    }

    #[tokio::test]
    async fn rockets_query_finds_product_fragment() {
        let store = Arc::new(SqliteVectorStore::new(
            Database::open_in_memory().await.unwrap(),
        ));
        let embedder = Arc::new(MockEmbedder::new(8));
        embedder.set_vector("Company name: Acme", vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        embedder.set_vector("Product: Rockets", vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        embedder.set_vector("What do we sell?", vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            store.clone(),
            &EmbeddingConfig::default(),
            &IngestionConfig::default(),
        );
        let profile: RawProfile = [("company_name", "Acme"), ("product", "Rockets")]
            .into_iter()
            .collect();
        pipeline.ingest(&scope("acme"), &profile).await.unwrap();

        let r = retriever(store, embedder);
        let result = r.retrieve(&scope("acme"), "What do we sell?", 1).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.fragments[0].fragment.text, "Product: Rockets");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn retrieval_never_crosses_scopes(
            tenants in prop::collection::vec(
                prop::collection::vec(("[a-z]{1,12}", 0usize..7), 1..6),
                2..5,
            ),
            query in "[a-z ]{1,24}",
            k in 1usize..10,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let store = Arc::new(SqliteVectorStore::new(
                    Database::open_in_memory().await.unwrap(),
                ));
                let embedder = Arc::new(MockEmbedder::new(16));
                let pipeline = IngestionPipeline::new(
                    embedder.clone(),
                    store.clone(),
                    &EmbeddingConfig::default(),
                    &IngestionConfig::default(),
                );
                for (t, fields) in tenants.iter().enumerate() {
                    let profile: RawProfile = fields
                        .iter()
                        .map(|(value, f)| (SourceField::ALL[*f].as_str(), value.as_str()))
                        .collect();
                    pipeline.ingest(&scope(&format!("tenant-{t}")), &profile).await.unwrap();
                }

                let r = retriever(store, embedder);
                for t in 0..tenants.len() {
                    let s = scope(&format!("tenant-{t}"));
                    let result = r.retrieve(&s, &query, k).await.unwrap();
                    assert!(result.len() <= k);
                    assert!(result.fragments.iter().all(|hit| hit.fragment.scope == s));
                    for pair in result.fragments.windows(2) {
                        assert!(pair[0].score >= pair[1].score);
                    }
                }
            });
        }
    }
}
