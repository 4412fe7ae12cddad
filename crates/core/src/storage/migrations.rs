//! Schema migrations for the local database.
//!
//! Applied versions are recorded in `_migrations`; each pending migration
//! runs in its own transaction together with its bookkeeping row.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// A numbered schema step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// In application order.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "kv_store", sql: include_str!("../../migrations/001_kv_store.sql") },
    Migration { version: 2, name: "asset_cache", sql: include_str!("../../migrations/002_asset_cache.sql") },
];

/// Apply every migration newer than the recorded schema version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the step whose SQL failed.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
        )?;

        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let failed = |e: tokio_rusqlite::rusqlite::Error| {
                Error::MigrationFailed(format!("{:03}_{}: {e}", migration.version, migration.name))
            };

            let tx = conn.transaction().map_err(failed)?;
            tx.execute_batch(migration.sql).map_err(failed)?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(failed)?;
            tx.commit().map_err(failed)?;

            tracing::debug!(version = migration.version, name = migration.name, "applied migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
