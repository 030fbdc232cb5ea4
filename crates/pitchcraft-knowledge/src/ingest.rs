// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Profile ingestion: extract, embed, upsert.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use pitchcraft_config::model::{EmbeddingConfig, IngestionConfig};
use pitchcraft_core::{
    EmbeddedFragment, EmbeddingAdapter, EmbeddingInput, FragmentDraft, FragmentId, IngestReport,
    PitchcraftError, RawProfile, SourceField, UserScope, VectorStoreAdapter,
};
use tracing::{debug, info};

use crate::extractor::extract;

/// The only writer of knowledge fragments.
pub struct IngestionPipeline {
    embedder: Arc<dyn EmbeddingAdapter>,
    store: Arc<dyn VectorStoreAdapter>,
    embed_timeout: Duration,
    force_reembed: bool,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingAdapter>,
        store: Arc<dyn VectorStoreAdapter>,
        embedding: &EmbeddingConfig,
        ingestion: &IngestionConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            embed_timeout: Duration::from_millis(embedding.timeout_ms),
            force_reembed: ingestion.force_reembed,
        }
    }

    /// Ingests one onboarding submission for `scope`.
    ///
    /// Fields whose text is unchanged are left alone unless `force_reembed` is
    /// set. Every changed field is embedded before anything is written, and all
    /// of them go to the store in a single upsert, so an embedding failure
    /// leaves the scope exactly as it was. Fields absent from `profile` are
    /// never deleted.
    pub async fn ingest(
        &self,
        scope: &UserScope,
        profile: &RawProfile,
    ) -> Result<IngestReport, PitchcraftError> {
        let extracted = extract(scope, profile);
        let mut report = IngestReport {
            skipped: extracted.skipped,
            ..IngestReport::default()
        };
        if extracted.drafts.is_empty() {
            debug!(scope = %scope, skipped = report.skipped.len(), "nothing to ingest");
            return Ok(report);
        }

        let existing: HashMap<SourceField, String> = self
            .store
            .fragments_for_scope(scope)
            .await?
            .into_iter()
            .map(|f| (f.source_field, f.text))
            .collect();

        let mut pending = Vec::with_capacity(extracted.drafts.len());
        for draft in extracted.drafts {
            let stored = existing.get(&draft.source_field);
            if !self.force_reembed && stored == Some(&draft.text) {
                report.unchanged.push(draft.source_field);
            } else {
                pending.push(draft);
            }
        }

        let mut embedded = Vec::with_capacity(pending.len());
        let mut dimensions = None;
        for draft in pending {
            let vector = self.embed_draft(&draft).await?;
            match dimensions {
                None => dimensions = Some(vector.len()),
                Some(expected) if expected != vector.len() => {
                    return Err(PitchcraftError::EmbeddingUnavailable {
                        field: Some(draft.source_field),
                        message: format!(
                            "embedding dimension {} differs from {expected}",
                            vector.len()
                        ),
                        source: None,
                    });
                }
                Some(_) => {}
            }
            embedded.push(EmbeddedFragment {
                draft,
                embedding: vector,
            });
        }

        if !embedded.is_empty() {
            for fragment in self.store.upsert(&embedded).await? {
                if existing.contains_key(&fragment.source_field) {
                    report.updated.push(fragment.source_field);
                } else {
                    report.created.push(fragment.source_field);
                }
            }
        }

        info!(
            scope = %scope,
            created = report.created.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "profile ingested"
        );
        Ok(report)
    }

    async fn embed_draft(&self, draft: &FragmentDraft) -> Result<Vec<f32>, PitchcraftError> {
        let field = draft.source_field;
        let input = EmbeddingInput {
            texts: vec![draft.text.clone()],
        };
        let output = match tokio::time::timeout(self.embed_timeout, self.embedder.embed(input)).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err @ PitchcraftError::EmbeddingUnavailable { .. })) => {
                return Err(err.for_field(field));
            }
            Ok(Err(other)) => {
                return Err(PitchcraftError::EmbeddingUnavailable {
                    field: Some(field),
                    message: other.to_string(),
                    source: Some(Box::new(other)),
                });
            }
            Err(_) => {
                return Err(PitchcraftError::EmbeddingUnavailable {
                    field: Some(field),
                    message: format!("timed out after {:?}", self.embed_timeout),
                    source: None,
                });
            }
        };

        match output.embeddings.into_iter().next() {
            Some(vector) if !vector.is_empty() => Ok(vector),
            _ => Err(PitchcraftError::EmbeddingUnavailable {
                field: Some(field),
                message: "embedder returned no vector".into(),
                source: None,
            }),
        }
    }

    /// Removes the fragment for `(scope, field)`. Returns whether it existed.
    pub async fn forget(
        &self,
        scope: &UserScope,
        field: SourceField,
    ) -> Result<bool, PitchcraftError> {
        let removed = self.store.delete(&FragmentId::derive(scope, field)).await?;
        info!(scope = %scope, field = %field, removed, "fragment forgotten");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteVectorStore;
    use pitchcraft_storage::Database;
    use pitchcraft_test_utils::MockEmbedder;

    struct Fixture {
        pipeline: IngestionPipeline,
        store: Arc<SqliteVectorStore>,
        embedder: Arc<MockEmbedder>,
    }

    async fn fixture(force_reembed: bool) -> Fixture {
        let store = Arc::new(SqliteVectorStore::new(
            Database::open_in_memory().await.unwrap(),
        ));
        let embedder = Arc::new(MockEmbedder::new(16));
        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            store.clone(),
            &EmbeddingConfig {
                timeout_ms: 200,
                ..EmbeddingConfig::default()
            },
            &IngestionConfig { force_reembed },
        );
        Fixture {
            pipeline,
            store,
            embedder,
        }
    }

    fn scope() -> UserScope {
        UserScope::new("acme").unwrap()
    }

    fn profile(pairs: &[(&str, &str)]) -> RawProfile {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn first_ingest_creates_one_fragment_per_field() {
        let fx = fixture(false).await;
        let report = fx
            .pipeline
            .ingest(
                &scope(),
                &profile(&[("company_name", "Acme"), ("product", "Rockets")]),
            )
            .await
            .unwrap();
        assert_eq!(report.count(), 2);
        assert_eq!(
            report.created,
            vec![SourceField::CompanyName, SourceField::Product]
        );
        assert_eq!(fx.store.count(&scope()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn editing_one_field_bumps_only_that_version() {
        let fx = fixture(false).await;
        fx.pipeline
            .ingest(
                &scope(),
                &profile(&[("company_name", "Acme"), ("product", "Rockets")]),
            )
            .await
            .unwrap();
        let report = fx
            .pipeline
            .ingest(
                &scope(),
                &profile(&[("company_name", "Acme Corp"), ("product", "Rockets")]),
            )
            .await
            .unwrap();
        assert_eq!(report.updated, vec![SourceField::CompanyName]);
        assert_eq!(report.unchanged, vec![SourceField::Product]);

        let fragments = fx.store.fragments_for_scope(&scope()).await.unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].version, 2);
        assert_eq!(fragments[0].text, "Company name: Acme Corp");
        assert_eq!(fragments[1].version, 1);
    }

    #[tokio::test]
    async fn unchanged_fields_are_not_re_embedded() {
        let fx = fixture(false).await;
        let p = profile(&[("product", "Rockets")]);
        fx.pipeline.ingest(&scope(), &p).await.unwrap();
        let calls = fx.embedder.call_count();
        let report = fx.pipeline.ingest(&scope(), &p).await.unwrap();
        assert_eq!(report.count(), 0);
        assert_eq!(fx.embedder.call_count(), calls);
    }

    #[tokio::test]
    async fn force_reembed_rewrites_identical_values() {
        let fx = fixture(true).await;
        let p = profile(&[("product", "Rockets")]);
        fx.pipeline.ingest(&scope(), &p).await.unwrap();
        let report = fx.pipeline.ingest(&scope(), &p).await.unwrap();
        assert_eq!(report.updated, vec![SourceField::Product]);
        let fragments = fx.store.fragments_for_scope(&scope()).await.unwrap();
        assert_eq!(fragments[0].version, 2);
    }

    #[tokio::test]
    async fn embedding_failure_names_field_and_writes_nothing() {
        let fx = fixture(false).await;
        fx.embedder.fail_on("Product: Rockets");
        let err = fx
            .pipeline
            .ingest(
                &scope(),
                &profile(&[("company_name", "Acme"), ("product", "Rockets")]),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PitchcraftError::EmbeddingUnavailable {
                field: Some(SourceField::Product),
                ..
            }
        ));
        assert_eq!(fx.store.count(&scope()).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_embedder_times_out() {
        let fx = fixture(false).await;
        fx.embedder.set_delay(Duration::from_secs(5));
        let err = fx
            .pipeline
            .ingest(&scope(), &profile(&[("tone", "Bold")]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PitchcraftError::EmbeddingUnavailable {
                field: Some(SourceField::Tone),
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_profile_touches_nothing() {
        let fx = fixture(false).await;
        let report = fx
            .pipeline
            .ingest(&scope(), &profile(&[("company_name", "  "), ("shoe_size", "9")]))
            .await
            .unwrap();
        assert_eq!(report.count(), 0);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(fx.embedder.call_count(), 0);
    }

    #[tokio::test]
    async fn absent_fields_are_kept() {
        let fx = fixture(false).await;
        fx.pipeline
            .ingest(&scope(), &profile(&[("company_name", "Acme"), ("tone", "Bold")]))
            .await
            .unwrap();
        fx.pipeline
            .ingest(&scope(), &profile(&[("company_name", "Acme Corp")]))
            .await
            .unwrap();
        assert_eq!(fx.store.count(&scope()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn forget_removes_one_field() {
        let fx = fixture(false).await;
        fx.pipeline
            .ingest(&scope(), &profile(&[("company_name", "Acme"), ("tone", "Bold")]))
            .await
            .unwrap();
        assert!(fx.pipeline.forget(&scope(), SourceField::Tone).await.unwrap());
        assert!(!fx.pipeline.forget(&scope(), SourceField::Tone).await.unwrap());
        assert_eq!(fx.store.count(&scope()).await.unwrap(), 1);
    }
}
