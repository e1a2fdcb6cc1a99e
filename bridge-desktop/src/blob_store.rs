//! Cache storage using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{KeyedBlobStore, StoredBlob},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use std::collections::HashMap;
use tracing::debug;

use crate::db::db_err;

/// SQLite-backed [`KeyedBlobStore`]
///
/// All namespaces share one table. The `seq` column records insertion order,
/// which eviction uses as its age proxy.
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    /// Wrap an open pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                namespace TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at INTEGER NOT NULL,
                UNIQUE(namespace, cache_key)
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(db_err("Failed to create cache_entries table"))?;

        Ok(Self { pool })
    }

    /// Create an in-memory store (for testing)
    pub async fn in_memory() -> Result<Self> {
        Self::new(crate::db::connect_in_memory().await?).await
    }
}

#[async_trait]
impl KeyedBlobStore for SqliteBlobStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<StoredBlob>> {
        let row = sqlx::query(
            "SELECT status, headers, body, stored_at FROM cache_entries \
             WHERE namespace = ? AND cache_key = ?",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to read cache entry"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: i64 = row.get("status");
        let headers: String = row.get("headers");
        let body: Vec<u8> = row.get("body");
        let stored_at: i64 = row.get("stored_at");

        let status = u16::try_from(status).map_err(|_| {
            BridgeError::DatabaseError(format!("Invalid stored status {} for {}", status, key))
        })?;
        let headers: HashMap<String, String> = serde_json::from_str(&headers).map_err(|e| {
            BridgeError::DatabaseError(format!("Corrupt headers for {}: {}", key, e))
        })?;
        let stored_at = DateTime::<Utc>::from_timestamp_millis(stored_at).ok_or_else(|| {
            BridgeError::DatabaseError(format!("Invalid stored_at for {}", key))
        })?;

        Ok(Some(StoredBlob {
            status,
            headers,
            body: Bytes::from(body),
            stored_at,
        }))
    }

    async fn put(&self, namespace: &str, key: &str, blob: StoredBlob) -> Result<()> {
        let headers = serde_json::to_string(&blob.headers).map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to encode headers: {}", e))
        })?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        // Delete then insert so a rewritten key moves to the newest position.
        sqlx::query("DELETE FROM cache_entries WHERE namespace = ? AND cache_key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to replace cache entry"))?;

        sqlx::query(
            "INSERT INTO cache_entries (namespace, cache_key, status, headers, body, stored_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(namespace)
        .bind(key)
        .bind(i64::from(blob.status))
        .bind(headers)
        .bind(blob.body.to_vec())
        .bind(blob.stored_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to write cache entry"))?;

        tx.commit()
            .await
            .map_err(db_err("Failed to commit cache entry"))?;

        debug!(namespace, key, "Stored cache entry");
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE namespace = ? AND cache_key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete cache entry"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT cache_key FROM cache_entries WHERE namespace = ? ORDER BY seq")
            .bind(namespace)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list cache keys"))?;

        Ok(rows.iter().map(|row| row.get::<String, _>(0)).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT namespace FROM cache_entries ORDER BY namespace")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to list cache namespaces"))?;

        Ok(rows.iter().map(|row| row.get::<String, _>(0)).collect())
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to clear cache namespace"))?;

        debug!(namespace, removed = result.rows_affected(), "Cleared cache namespace");
        Ok(result.rows_affected())
    }
}
