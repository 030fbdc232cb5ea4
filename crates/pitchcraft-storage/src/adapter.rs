// SPDX-FileCopyrightText: 2026 Pitchcraft Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ConversationStore trait.

use async_trait::async_trait;
use tracing::debug;

use pitchcraft_config::model::StorageConfig;
use pitchcraft_core::{
    AdapterType, ConversationId, ConversationStore, ConversationTurn, HealthStatus, NewTurn,
    PitchcraftError, PluginAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation log.
///
/// Wraps a [`Database`] handle and delegates to [`queries::turns`].
#[derive(Clone)]
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    /// Opens the database named by `config`, applying migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, PitchcraftError> {
        let db = Database::open_with_options(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite storage initialized");
        Ok(Self { db })
    }

    /// Wraps an already-open database, sharing its connection.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PitchcraftError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PitchcraftError> {
        self.db.checkpoint().await
    }
}

#[async_trait]
impl ConversationStore for SqliteStorage {
    async fn append_turns(
        &self,
        conversation_id: &ConversationId,
        turns: Vec<NewTurn>,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError> {
        queries::turns::append_turns(&self.db, conversation_id, turns).await
    }

    async fn turns_before(
        &self,
        conversation_id: &ConversationId,
        before: Option<u64>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError> {
        queries::turns::turns_before(&self.db, conversation_id, before, limit).await
    }

    async fn all_turns(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationTurn>, PitchcraftError> {
        queries::turns::all_turns(&self.db, conversation_id).await
    }

    async fn turn_count(&self, conversation_id: &ConversationId) -> Result<u64, PitchcraftError> {
        queries::turns::turn_count(&self.db, conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let storage = SqliteStorage::open(&make_config(db_path.to_str().unwrap()))
            .await
            .unwrap();

        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn turns_survive_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("persist.db");
        let config = make_config(db_path.to_str().unwrap());
        let cid = ConversationId::new("conv").unwrap();

        {
            let storage = SqliteStorage::open(&config).await.unwrap();
            storage
                .append_turns(&cid, vec![NewTurn::user("hello")])
                .await
                .unwrap();
            storage.shutdown().await.unwrap();
        }

        let storage = SqliteStorage::open(&config).await.unwrap();
        let turns = storage.all_turns(&cid).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].text, "hello");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_gap_free() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("concurrent.db");
        let storage = Arc::new(
            SqliteStorage::open(&make_config(db_path.to_str().unwrap()))
                .await
                .unwrap(),
        );
        let cid = ConversationId::new("busy").unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let storage = Arc::clone(&storage);
            let cid = cid.clone();
            handles.push(tokio::spawn(async move {
                storage
                    .append_turns(&cid, vec![NewTurn::user(format!("message {i}"))])
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let seqs: Vec<u64> = storage
            .all_turns(&cid)
            .await
            .unwrap()
            .iter()
            .map(|t| t.sequence_number)
            .collect();
        assert_eq!(seqs, (1..=50).collect::<Vec<u64>>());
    }
}
