//! Storage Abstractions
//!
//! Two persistence capabilities back the coordinator:
//! - [`KeyedBlobStore`]: namespaced key → response blob mapping (one namespace per cache tier)
//! - [`DurableOrderedQueue`]: append-only ordered list of opaque records (offline actions)
//!
//! Desktop hosts implement both over SQLite; browser hosts would map them onto
//! the Cache API and IndexedDB.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;

/// A stored response blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    /// Write time, set once by the writer and never updated in place.
    pub stored_at: DateTime<Utc>,
}

/// Namespaced key-value blob storage
///
/// # Contract
///
/// - Each `put` is atomic for its key; concurrent writers to the same key
///   never interleave.
/// - Re-putting an existing key replaces it and moves it to the newest
///   position in insertion order.
/// - `list_keys` returns keys oldest-first by insertion.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::KeyedBlobStore;
///
/// async fn drop_oldest(store: &dyn KeyedBlobStore, namespace: &str) -> Result<()> {
///     if let Some(oldest) = store.list_keys(namespace).await?.first() {
///         store.delete(namespace, oldest).await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyedBlobStore: Send + Sync {
    /// Fetch a blob, `Ok(None)` if absent
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<StoredBlob>>;

    /// Insert or replace a blob
    async fn put(&self, namespace: &str, key: &str, blob: StoredBlob) -> Result<()>;

    /// Delete a blob, returning whether it existed
    async fn delete(&self, namespace: &str, key: &str) -> Result<bool>;

    /// List keys in insertion order (oldest first)
    async fn list_keys(&self, namespace: &str) -> Result<Vec<String>>;

    /// List every namespace that currently holds at least one entry
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// Remove every entry in a namespace, returning the number removed
    async fn clear_namespace(&self, namespace: &str) -> Result<u64>;
}

/// A record held by a [`DurableOrderedQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedRecord {
    /// Monotonically increasing id assigned on append
    pub id: i64,
    pub payload: Bytes,
    pub enqueued_at: DateTime<Utc>,
}

/// Persistent FIFO queue
///
/// `append` must not return until the record is durable: a record appended
/// right before an abrupt process exit is visible after restart.
#[async_trait]
pub trait DurableOrderedQueue: Send + Sync {
    /// Append a record and return its id
    async fn append(&self, payload: Bytes, enqueued_at: DateTime<Utc>) -> Result<i64>;

    /// All records in ascending id order
    async fn peek_all(&self) -> Result<Vec<QueuedRecord>>;

    /// Remove a record by id, returning whether it existed
    async fn remove(&self, id: i64) -> Result<bool>;

    /// Number of queued records
    async fn len(&self) -> Result<u64>;

    /// Check whether the queue is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every record, returning the number removed
    async fn clear(&self) -> Result<u64>;
}
