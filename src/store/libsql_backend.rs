//! `SnapshotStore` on libSQL, file-backed or in-memory.
//!
//! Snapshots live in the `workflow_snapshots` table as JSON text keyed by the
//! caller's key.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::info;

use super::migrations;
use super::traits::SnapshotStore;
use crate::error::StoreError;

/// Snapshot store over a single reused libSQL connection.
pub struct LibSqlSnapshotStore {
    // Keeps the database alive for as long as `conn` is in use.
    _db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlSnapshotStore {
    /// Open (creating if needed) a database file, then migrate it.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| {
                StoreError::Pool(format!("create {}: {e}", dir.display()))
            })?;
        }
        let store = Self::open(libsql::Builder::new_local(path).build().await).await?;
        info!(path = %path.display(), "Snapshot store opened");
        Ok(store)
    }

    /// Throwaway in-memory database.
    pub async fn new_memory() -> Result<Self, StoreError> {
        Self::open(libsql::Builder::new_local(":memory:").build().await).await
    }

    async fn open(built: libsql::Result<LibSqlDatabase>) -> Result<Self, StoreError> {
        let db = built.map_err(|e| StoreError::Pool(format!("open database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("connect: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            _db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl SnapshotStore for LibSqlSnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM workflow_snapshots WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| StoreError::Query(format!("get snapshot {key}: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get snapshot {key}: {e}")))?
        else {
            return Ok(None);
        };
        row.get::<String>(0)
            .map(Some)
            .map_err(|e| StoreError::Query(format!("decode snapshot {key}: {e}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO workflow_snapshots (key, value, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("save snapshot {key}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let count = self
            .conn
            .execute("DELETE FROM workflow_snapshots WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("delete snapshot {key}: {e}")))?;
        Ok(count > 0)
    }
}
