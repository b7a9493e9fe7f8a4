//! Schema migrations for the libSQL snapshot store.
//!
//! Applied versions are tracked in `_schema_versions`. Each pending
//! migration runs in one batch together with its version record, so a
//! failed migration leaves no partial trace.

use libsql::Connection;
use tracing::{debug, info};

use crate::error::StoreError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

impl Migration {
    async fn apply(&self, conn: &Connection) -> Result<(), StoreError> {
        let batch = format!(
            "BEGIN;\n{}\nINSERT INTO _schema_versions (version, name) VALUES ({}, '{}');\nCOMMIT;",
            self.sql, self.version, self.name
        );
        if let Err(e) = conn.execute_batch(&batch).await {
            // Leave no transaction open.
            let _ = conn.execute("ROLLBACK", ()).await;
            return Err(StoreError::Migration(format!(
                "V{} ({}) failed: {e}",
                self.version, self.name
            )));
        }
        Ok(())
    }
}

/// Ordered migrations. Append only.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "workflow_snapshots",
        sql: "CREATE TABLE IF NOT EXISTS workflow_snapshots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
    },
    Migration {
        version: 2,
        name: "workflow_snapshots_updated_at",
        sql: "CREATE INDEX IF NOT EXISTS idx_workflow_snapshots_updated_at
                ON workflow_snapshots (updated_at);",
    },
];

/// Latest schema version this build knows about.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Bring the schema up to [`latest_version`].
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _schema_versions (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("create _schema_versions: {e}")))?;

    let current = schema_version(conn).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying snapshot store migration"
        );
        migration.apply(conn).await?;
    }

    debug!(version = latest_version(), "Snapshot store schema up to date");
    Ok(())
}

/// Highest applied version, 0 for a fresh database.
pub async fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _schema_versions", ())
        .await
        .map_err(|e| StoreError::Migration(format!("read schema version: {e}")))?;

    let Some(row) = rows
        .next()
        .await
        .map_err(|e| StoreError::Migration(format!("read schema version: {e}")))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| StoreError::Migration(format!("decode schema version: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_conn() -> Connection {
        libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap()
            .connect()
            .unwrap()
    }

    async fn table_exists(conn: &Connection, name: &str) -> bool {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = ?1",
                libsql::params![name],
            )
            .await
            .unwrap();
        let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        count == 1
    }

    #[tokio::test]
    async fn fresh_database_reaches_latest_version() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();

        assert_eq!(schema_version(&conn).await.unwrap(), latest_version());
        assert!(table_exists(&conn, "workflow_snapshots").await);
        assert!(table_exists(&conn, "idx_workflow_snapshots_updated_at").await);
    }

    #[tokio::test]
    async fn rerunning_is_a_noop() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT COUNT(*) FROM _schema_versions", ())
            .await
            .unwrap();
        let applied: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn upgrades_from_an_older_schema() {
        let conn = memory_conn().await;
        conn.execute(
            "CREATE TABLE _schema_versions (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
            (),
        )
        .await
        .unwrap();
        MIGRATIONS[0].apply(&conn).await.unwrap();
        assert_eq!(schema_version(&conn).await.unwrap(), 1);

        run_migrations(&conn).await.unwrap();
        assert_eq!(schema_version(&conn).await.unwrap(), 2);
        assert!(table_exists(&conn, "idx_workflow_snapshots_updated_at").await);
    }
}
