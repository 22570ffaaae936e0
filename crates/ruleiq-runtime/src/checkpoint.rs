//! Checkpoint Store (C6).
//!
//! Persists graph run state (`ComplianceState` snapshots) keyed by run id and
//! monotonic version, so an interrupted run can be resumed from its last
//! checkpoint. Mirrors the store/trait split in
//! `ruleiq_foundation::persistence` (`InMemoryStore` for tests, `SqliteStore`
//! for durable deployments) but adds the version-ordering check that
//! checkpointing (unlike message/session storage) actually needs: a write
//! for a stale version is rejected rather than silently overwriting newer
//! state.

use async_trait::async_trait;
use ruleiq_foundation::persistence::{PersistenceError, PersistenceResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One persisted snapshot of a run's graph state.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub run_id: Uuid,
    pub version: u64,
    pub node_id: String,
    pub state: Value,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist `checkpoint` iff it's the first checkpoint for the run, or its
    /// version is exactly one past the latest stored version. Returns the
    /// latest known version on conflict so the caller can decide whether to
    /// retry.
    async fn put(&self, checkpoint: Checkpoint) -> PersistenceResult<()>;

    async fn latest(&self, run_id: Uuid) -> PersistenceResult<Option<Checkpoint>>;

    async fn get(&self, run_id: Uuid, version: u64) -> PersistenceResult<Option<Checkpoint>>;

    async fn history(&self, run_id: Uuid) -> PersistenceResult<Vec<Checkpoint>>;

    async fn delete_run(&self, run_id: Uuid) -> PersistenceResult<()>;
}

/// In-memory checkpoint store, used in tests and for ephemeral runs.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    runs: RwLock<HashMap<Uuid, Vec<Checkpoint>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, checkpoint: Checkpoint) -> PersistenceResult<()> {
        let mut runs = self.runs.write().await;
        let history = runs.entry(checkpoint.run_id).or_default();
        let expected_version = history.last().map(|c| c.version + 1).unwrap_or(0);
        if checkpoint.version != expected_version {
            return Err(PersistenceError::Constraint(format!(
                "checkpoint version conflict: expected {expected_version}, got {}",
                checkpoint.version
            )));
        }
        history.push(checkpoint);
        Ok(())
    }

    async fn latest(&self, run_id: Uuid) -> PersistenceResult<Option<Checkpoint>> {
        Ok(self.runs.read().await.get(&run_id).and_then(|h| h.last().cloned()))
    }

    async fn get(&self, run_id: Uuid, version: u64) -> PersistenceResult<Option<Checkpoint>> {
        Ok(self
            .runs
            .read()
            .await
            .get(&run_id)
            .and_then(|h| h.iter().find(|c| c.version == version).cloned()))
    }

    async fn history(&self, run_id: Uuid) -> PersistenceResult<Vec<Checkpoint>> {
        Ok(self.runs.read().await.get(&run_id).cloned().unwrap_or_default())
    }

    async fn delete_run(&self, run_id: Uuid) -> PersistenceResult<()> {
        self.runs.write().await.remove(&run_id);
        Ok(())
    }
}

#[cfg(feature = "persistence-sqlite")]
pub mod sqlite {
    use super::*;
    use sqlx::Row;
    use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

    pub struct SqliteCheckpointStore {
        pool: SqlitePool,
    }

    impl SqliteCheckpointStore {
        pub async fn connect(database_url: &str) -> PersistenceResult<Self> {
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await
                .map_err(|e| PersistenceError::Connection(e.to_string()))?;
            let store = Self { pool };
            store.run_migrations().await?;
            Ok(store)
        }

        pub async fn in_memory() -> PersistenceResult<Self> {
            Self::connect("sqlite::memory:").await
        }

        async fn run_migrations(&self) -> PersistenceResult<()> {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS checkpoints (
                    run_id TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    node_id TEXT NOT NULL,
                    state TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (run_id, version)
                )
                "#,
            )
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;
            Ok(())
        }
    }

    #[async_trait]
    impl CheckpointStore for SqliteCheckpointStore {
        async fn put(&self, checkpoint: Checkpoint) -> PersistenceResult<()> {
            let expected_version: i64 = sqlx::query(
                "SELECT COALESCE(MAX(version), -1) + 1 as next FROM checkpoints WHERE run_id = ?",
            )
            .bind(checkpoint.run_id.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?
            .get("next");

            if checkpoint.version as i64 != expected_version {
                return Err(PersistenceError::Constraint(format!(
                    "checkpoint version conflict: expected {expected_version}, got {}",
                    checkpoint.version
                )));
            }

            sqlx::query(
                "INSERT INTO checkpoints (run_id, version, node_id, state, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(checkpoint.run_id.to_string())
            .bind(checkpoint.version as i64)
            .bind(&checkpoint.node_id)
            .bind(checkpoint.state.to_string())
            .bind(checkpoint.created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;
            Ok(())
        }

        async fn latest(&self, run_id: Uuid) -> PersistenceResult<Option<Checkpoint>> {
            let row = sqlx::query(
                "SELECT run_id, version, node_id, state, created_at FROM checkpoints WHERE run_id = ? ORDER BY version DESC LIMIT 1",
            )
            .bind(run_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;
            row.map(row_to_checkpoint).transpose()
        }

        async fn get(&self, run_id: Uuid, version: u64) -> PersistenceResult<Option<Checkpoint>> {
            let row = sqlx::query(
                "SELECT run_id, version, node_id, state, created_at FROM checkpoints WHERE run_id = ? AND version = ?",
            )
            .bind(run_id.to_string())
            .bind(version as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;
            row.map(row_to_checkpoint).transpose()
        }

        async fn history(&self, run_id: Uuid) -> PersistenceResult<Vec<Checkpoint>> {
            let rows = sqlx::query(
                "SELECT run_id, version, node_id, state, created_at FROM checkpoints WHERE run_id = ? ORDER BY version ASC",
            )
            .bind(run_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PersistenceError::Query(e.to_string()))?;
            rows.into_iter().map(row_to_checkpoint).collect()
        }

        async fn delete_run(&self, run_id: Uuid) -> PersistenceResult<()> {
            sqlx::query("DELETE FROM checkpoints WHERE run_id = ?")
                .bind(run_id.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| PersistenceError::Query(e.to_string()))?;
            Ok(())
        }
    }

    fn row_to_checkpoint(row: sqlx::sqlite::SqliteRow) -> PersistenceResult<Checkpoint> {
        let run_id: String = row.get("run_id");
        let version: i64 = row.get("version");
        let state: String = row.get("state");
        let created_at: String = row.get("created_at");
        Ok(Checkpoint {
            run_id: Uuid::parse_str(&run_id).map_err(|e| PersistenceError::Serialization(e.to_string()))?,
            version: version as u64,
            node_id: row.get("node_id"),
            state: serde_json::from_str(&state).map_err(|e| PersistenceError::Serialization(e.to_string()))?,
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| PersistenceError::Serialization(e.to_string()))?
                .with_timezone(&chrono::Utc),
        })
    }
}
