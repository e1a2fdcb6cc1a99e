//! SQLite connection setup shared by the blob store and the action queue

use bridge_traits::error::{BridgeError, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use tracing::debug;

/// Open (or create) a SQLite database file.
///
/// WAL with `synchronous = FULL` makes every committed write durable before
/// the call returns.
pub async fn connect_sqlite(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))?;

    debug!(path = ?db_path, "Opened SQLite database");
    Ok(pool)
}

/// In-memory database for tests. A single pinned connection keeps the data alive.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| BridgeError::DatabaseError(format!("Failed to connect to DB: {}", e)))
}

pub(crate) fn db_err(context: &str) -> impl FnOnce(sqlx::Error) -> BridgeError + '_ {
    move |e| BridgeError::DatabaseError(format!("{}: {}", context, e))
}
