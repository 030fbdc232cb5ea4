// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed vector store.
//!
//! Embeddings live as BLOBs next to fragment metadata in the main database.
//! Search is a brute-force cosine scan over one scope's rows, which stays
//! cheap because a scope holds at most one fragment per onboarding field.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use pitchcraft_core::{
    AdapterType, EmbeddedFragment, FragmentId, HealthStatus, KnowledgeFragment, PitchcraftError,
    PluginAdapter, ScoredFragment, SourceField, UserScope, VectorStoreAdapter,
};
use pitchcraft_storage::Database;
use rusqlite::{TransactionBehavior, params, types::Type};
use tracing::{debug, warn};

use crate::vector::{blob_to_vec, cosine_similarity, vec_to_blob};

const FRAGMENT_COLUMNS: &str = "id, user_scope, source_field, text, embedding, created_at, version";

fn map_store_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PitchcraftError {
    PitchcraftError::VectorStoreUnavailable {
        message: "sqlite vector store query failed".into(),
        source: Some(Box::new(e)),
    }
}

fn row_to_fragment(row: &rusqlite::Row<'_>) -> Result<KnowledgeFragment, rusqlite::Error> {
    let conversion = |idx: usize, e: PitchcraftError| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    };

    let scope: String = row.get(1)?;
    let field: String = row.get(2)?;
    let blob: Vec<u8> = row.get(4)?;
    let version: i64 = row.get(6)?;

    Ok(KnowledgeFragment {
        id: FragmentId::from_stored(row.get::<_, String>(0)?),
        scope: UserScope::new(scope).map_err(|e| conversion(1, e))?,
        source_field: SourceField::from_str(&field).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?,
        text: row.get(3)?,
        embedding: blob_to_vec(&blob),
        created_at: row.get(5)?,
        version: version as u64,
    })
}

/// Knowledge fragments stored in the `knowledge_fragments` table.
#[derive(Clone)]
pub struct SqliteVectorStore {
    db: Database,
}

impl SqliteVectorStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PluginAdapter for SqliteVectorStore {
    fn name(&self) -> &str {
        "sqlite-vectors"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::VectorStore
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        self.db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT COUNT(*) FROM knowledge_fragments", [], |row| {
                    row.get(0)
                })
            })
            .await
            .map_err(map_store_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        Ok(())
    }
}

#[async_trait]
impl VectorStoreAdapter for SqliteVectorStore {
    async fn upsert(
        &self,
        fragments: &[EmbeddedFragment],
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }
        let fragments = fragments.to_vec();
        let stored = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<KnowledgeFragment>, rusqlite::Error> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let mut stored = Vec::with_capacity(fragments.len());
                {
                    let mut stmt = tx.prepare_cached(
                        "INSERT INTO knowledge_fragments
                         (id, user_scope, source_field, text, embedding, created_at, version)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)
                         ON CONFLICT(id) DO UPDATE SET
                             text = excluded.text,
                             embedding = excluded.embedding,
                             created_at = excluded.created_at,
                             version = knowledge_fragments.version + 1
                         RETURNING version",
                    )?;
                    for fragment in fragments {
                        let draft = fragment.draft;
                        let id = draft.id();
                        let version: i64 = stmt.query_row(
                            params![
                                id.as_str(),
                                draft.scope.as_str(),
                                draft.source_field.as_str(),
                                draft.text,
                                vec_to_blob(&fragment.embedding),
                                created_at,
                            ],
                            |row| row.get(0),
                        )?;
                        stored.push(KnowledgeFragment {
                            id,
                            scope: draft.scope,
                            source_field: draft.source_field,
                            text: draft.text,
                            embedding: fragment.embedding,
                            created_at: created_at.clone(),
                            version: version as u64,
                        });
                    }
                }
                tx.commit()?;
                Ok(stored)
            })
            .await
            .map_err(map_store_err)?;
        debug!(count = stored.len(), "fragments upserted");
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
        let candidates = self.fragments_for_scope(scope).await?;
        let mut scored: Vec<ScoredFragment> = candidates
            .into_iter()
            .filter_map(|fragment| match cosine_similarity(vector, &fragment.embedding) {
                Some(score) => Some(ScoredFragment { fragment, score }),
                None => {
                    warn!(
                        id = %fragment.id,
                        stored_dim = fragment.embedding.len(),
                        query_dim = vector.len(),
                        "skipping fragment with incompatible embedding"
                    );
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn fragments_for_scope(
        &self,
        scope: &UserScope,
    ) -> Result<Vec<KnowledgeFragment>, PitchcraftError> {
        let scope = scope.as_str().to_string();
        let mut fragments = self
            .db
            .connection()
            .call(move |conn| -> Result<Vec<KnowledgeFragment>, rusqlite::Error> {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {FRAGMENT_COLUMNS} FROM knowledge_fragments WHERE user_scope = ?1"
                ))?;
                let rows = stmt.query_map(params![scope], row_to_fragment)?;
                rows.collect()
            })
            .await
            .map_err(map_store_err)?;
        fragments.sort_by_key(|f| f.source_field);
        Ok(fragments)
    }

    async fn count(&self, scope: &UserScope) -> Result<u64, PitchcraftError> {
        let scope = scope.as_str().to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<i64, rusqlite::Error> {
                conn.query_row(
                    "SELECT COUNT(*) FROM knowledge_fragments WHERE user_scope = ?1",
                    params![scope],
                    |row| row.get(0),
                )
            })
            .await
            .map(|n| n as u64)
            .map_err(map_store_err)
    }

    async fn delete(&self, id: &FragmentId) -> Result<bool, PitchcraftError> {
        let id = id.as_str().to_string();
        self.db
            .connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute("DELETE FROM knowledge_fragments WHERE id = ?1", params![id])
            })
            .await
            .map(|n| n > 0)
            .map_err(map_store_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pitchcraft_core::FragmentDraft;

    async fn store() -> SqliteVectorStore {
        SqliteVectorStore::new(Database::open_in_memory().await.unwrap())
    }

    fn embedded(scope: &str, field: SourceField, text: &str, v: Vec<f32>) -> EmbeddedFragment {
        EmbeddedFragment {
            draft: FragmentDraft {
                scope: UserScope::new(scope).unwrap(),
                source_field: field,
                text: text.to_string(),
            },
            embedding: v,
        }
    }

    #[tokio::test]
    async fn upsert_then_read_back() {
        let store = store().await;
        let stored = store
            .upsert(&[embedded("acme", SourceField::Product, "Product: Rockets", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(stored[0].version, 1);

        let scope = UserScope::new("acme").unwrap();
        let all = store.fragments_for_scope(&scope).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].text, "Product: Rockets");
        assert_eq!(all[0].embedding, vec![1.0, 0.0]);
        assert_eq!(all[0].id, FragmentId::derive(&scope, SourceField::Product));
    }

    #[tokio::test]
    async fn re_upsert_bumps_version_without_duplicating() {
        let store = store().await;
        let scope = UserScope::new("acme").unwrap();
        store
            .upsert(&[embedded("acme", SourceField::CompanyName, "Company name: Acme", vec![1.0])])
            .await
            .unwrap();
        let second = store
            .upsert(&[embedded(
                "acme",
                SourceField::CompanyName,
                "Company name: Acme Corp",
                vec![1.0],
            )])
            .await
            .unwrap();
        assert_eq!(second[0].version, 2);
        assert_eq!(store.count(&scope).await.unwrap(), 1);
        let all = store.fragments_for_scope(&scope).await.unwrap();
        assert_eq!(all[0].text, "Company name: Acme Corp");
    }

    #[tokio::test]
    async fn search_is_scope_filtered_and_ranked() {
        let store = store().await;
        store
            .upsert(&[
                embedded("acme", SourceField::Product, "Product: Rockets", vec![1.0, 0.0]),
                embedded("acme", SourceField::Tone, "Tone of voice: Bold", vec![0.0, 1.0]),
                embedded("globex", SourceField::Product, "Product: Widgets", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let acme = UserScope::new("acme").unwrap();
        let hits = store.search(&acme, &[0.9, 0.1], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].fragment.text, "Product: Rockets");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| h.fragment.scope == acme));

        let top = store.search(&acme, &[0.9, 0.1], 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn search_skips_incompatible_dimensions() {
        let store = store().await;
        store
            .upsert(&[embedded("acme", SourceField::Product, "Product: Rockets", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let acme = UserScope::new("acme").unwrap();
        assert!(store.search(&acme, &[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = store().await;
        let acme = UserScope::new("acme").unwrap();
        store
            .upsert(&[embedded("acme", SourceField::Goals, "Goals: Mars", vec![1.0])])
            .await
            .unwrap();
        let id = FragmentId::derive(&acme, SourceField::Goals);
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert_eq!(store.count(&acme).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn fragments_are_ordered_by_field() {
        let store = store().await;
        store
            .upsert(&[
                embedded("acme", SourceField::Tone, "Tone of voice: Bold", vec![1.0]),
                embedded("acme", SourceField::CompanyName, "Company name: Acme", vec![1.0]),
            ])
            .await
            .unwrap();
        let acme = UserScope::new("acme").unwrap();
        let fields: Vec<SourceField> = store
            .fragments_for_scope(&acme)
            .await
            .unwrap()
            .iter()
            .map(|f| f.source_field)
            .collect();
        assert_eq!(fields, vec![SourceField::CompanyName, SourceField::Tone]);
    }
}
