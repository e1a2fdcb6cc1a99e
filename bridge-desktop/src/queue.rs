//! Durable action queue using SQLite

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{DurableOrderedQueue, QueuedRecord},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};
use tracing::debug;

use crate::db::db_err;

/// SQLite-backed [`DurableOrderedQueue`]
///
/// Ids come from `AUTOINCREMENT`, so they never repeat even after the
/// newest record is removed.
pub struct SqliteActionQueue {
    pool: SqlitePool,
}

impl SqliteActionQueue {
    /// Wrap an open pool, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS offline_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                payload BLOB NOT NULL,
                enqueued_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(db_err("Failed to create offline_actions table"))?;

        Ok(Self { pool })
    }

    /// Create an in-memory queue (for testing)
    pub async fn in_memory() -> Result<Self> {
        Self::new(crate::db::connect_in_memory().await?).await
    }
}

#[async_trait]
impl DurableOrderedQueue for SqliteActionQueue {
    async fn append(&self, payload: Bytes, enqueued_at: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query("INSERT INTO offline_actions (payload, enqueued_at) VALUES (?, ?)")
            .bind(payload.to_vec())
            .bind(enqueued_at.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to append offline action"))?;

        let id = result.last_insert_rowid();
        debug!(id, "Appended offline action");
        Ok(id)
    }

    async fn peek_all(&self) -> Result<Vec<QueuedRecord>> {
        let rows = sqlx::query("SELECT id, payload, enqueued_at FROM offline_actions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to read offline actions"))?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let payload: Vec<u8> = row.get("payload");
                let enqueued_at: i64 = row.get("enqueued_at");
                let enqueued_at = DateTime::<Utc>::from_timestamp_millis(enqueued_at)
                    .ok_or_else(|| {
                        BridgeError::DatabaseError(format!("Invalid enqueued_at for action {}", id))
                    })?;

                Ok(QueuedRecord {
                    id,
                    payload: Bytes::from(payload),
                    enqueued_at,
                })
            })
            .collect()
    }

    async fn remove(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM offline_actions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to remove offline action"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) FROM offline_actions")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count offline actions"))?
            .get(0);

        Ok(count.max(0) as u64)
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM offline_actions")
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to clear offline actions"))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let queue = SqliteActionQueue::in_memory().await.unwrap();
        let first = queue.append(Bytes::from_static(b"a"), Utc::now()).await.unwrap();
        let second = queue.append(Bytes::from_static(b"b"), Utc::now()).await.unwrap();

        assert!(second > first);
        let records = queue.peek_all().await.unwrap();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first, second]);
        assert_eq!(records[1].payload, Bytes::from_static(b"b"));
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_remove() {
        let queue = SqliteActionQueue::in_memory().await.unwrap();
        let first = queue.append(Bytes::from_static(b"a"), Utc::now()).await.unwrap();
        assert!(queue.remove(first).await.unwrap());
        assert!(!queue.remove(first).await.unwrap());

        let next = queue.append(Bytes::from_static(b"b"), Utc::now()).await.unwrap();
        assert!(next > first);
        assert_eq!(queue.len().await.unwrap(), 1);
        assert_eq!(queue.clear().await.unwrap(), 1);
        assert!(queue.is_empty().await.unwrap());
    }
}
