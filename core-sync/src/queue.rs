//! Durable offline action queue

use bridge_traits::{storage::DurableOrderedQueue, time::Clock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::action::{NewOfflineAction, OfflineAction};
use crate::error::Result;

/// Offline actions over a host [`DurableOrderedQueue`].
///
/// `enqueue` returns only after the action is durable. It also registers
/// interest in the connectivity-restored signal. A replay pass clears the
/// registration before reading the queue and restores it if anything is left.
#[derive(Clone)]
pub struct OfflineQueue {
    inner: Arc<dyn DurableOrderedQueue>,
    clock: Arc<dyn Clock>,
    replay_registered: Arc<AtomicBool>,
}

impl OfflineQueue {
    pub fn new(inner: Arc<dyn DurableOrderedQueue>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            clock,
            replay_registered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn enqueue(&self, action: NewOfflineAction) -> Result<OfflineAction> {
        action.validate()?;

        let enqueued_at = self.clock.now();
        let id = self.inner.append(action.to_payload()?, enqueued_at).await?;
        info!(action_id = id, method = %action.method, url = %action.url, "Queued offline action");

        self.register_replay();
        Ok(OfflineAction::assemble(id, action, enqueued_at))
    }

    /// All decodable actions in id order. Undecodable records are skipped.
    pub async fn pending(&self) -> Result<Vec<OfflineAction>> {
        let records = self.inner.peek_all().await?;
        let mut actions = Vec::with_capacity(records.len());

        for record in &records {
            match OfflineAction::from_record(record) {
                Ok(action) => actions.push(action),
                Err(e) => warn!(action_id = record.id, error = %e, "Skipping undecodable offline action"),
            }
        }
        Ok(actions)
    }

    pub async fn remove(&self, id: i64) -> Result<bool> {
        Ok(self.inner.remove(id).await?)
    }

    pub async fn len(&self) -> Result<u64> {
        Ok(self.inner.len().await?)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.inner.is_empty().await?)
    }

    /// Drop every queued action. Operator use only: nothing is replayed.
    pub async fn purge(&self) -> Result<u64> {
        let removed = self.inner.clear().await?;
        self.replay_registered.store(false, Ordering::SeqCst);
        warn!(removed, "Purged offline action queue");
        Ok(removed)
    }

    pub fn is_replay_registered(&self) -> bool {
        self.replay_registered.load(Ordering::SeqCst)
    }

    /// Re-register after a restart if actions survived it.
    pub async fn restore_registration(&self) -> Result<bool> {
        let pending = !self.inner.is_empty().await?;
        if pending {
            self.register_replay();
        }
        Ok(pending)
    }

    /// Clear the registration, returning whether it was set.
    pub(crate) fn take_registration(&self) -> bool {
        self.replay_registered.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn register_replay(&self) {
        if !self.replay_registered.swap(true, Ordering::SeqCst) {
            debug!("Registered for connectivity-restored replay");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteActionQueue;
    use bridge_traits::http::HttpMethod;
    use bridge_traits::time::ManualClock;
    use bytes::Bytes;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<ManualClock> {
        // Whole milliseconds, so times survive the store's ms resolution
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    async fn queue() -> (OfflineQueue, Arc<SqliteActionQueue>) {
        let store = Arc::new(SqliteActionQueue::in_memory().await.unwrap());
        (OfflineQueue::new(store.clone(), clock()), store)
    }

    #[tokio::test]
    async fn test_enqueue_assigns_increasing_ids_and_registers() {
        let (queue, _) = queue().await;
        assert!(!queue.is_replay_registered());

        let first = queue
            .enqueue(NewOfflineAction::new(HttpMethod::Post, "/api/tickets").body("{}"))
            .await
            .unwrap();
        let second = queue
            .enqueue(NewOfflineAction::new(HttpMethod::Delete, "/api/tickets/9"))
            .await
            .unwrap();

        assert!(second.id > first.id);
        assert!(queue.is_replay_registered());

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending, vec![first, second]);
    }

    #[tokio::test]
    async fn test_enqueue_rejects_reads() {
        let (queue, _) = queue().await;
        let result = queue
            .enqueue(NewOfflineAction::new(HttpMethod::Get, "/api/tickets"))
            .await;

        assert!(result.is_err());
        assert_eq!(queue.len().await.unwrap(), 0);
        assert!(!queue.is_replay_registered());
    }

    #[tokio::test]
    async fn test_undecodable_records_are_skipped() {
        let (queue, store) = queue().await;
        store
            .append(Bytes::from_static(b"not json"), Utc::now())
            .await
            .unwrap();
        queue
            .enqueue(NewOfflineAction::new(HttpMethod::Put, "/api/users/1"))
            .await
            .unwrap();

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "/api/users/1");
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_purge_and_restore_registration() {
        let (queue, _) = queue().await;
        queue
            .enqueue(NewOfflineAction::new(HttpMethod::Post, "/api/tickets"))
            .await
            .unwrap();

        let fresh = OfflineQueue::new(queue.inner.clone(), clock());
        assert!(!fresh.is_replay_registered());
        assert!(fresh.restore_registration().await.unwrap());
        assert!(fresh.is_replay_registered());

        assert_eq!(fresh.purge().await.unwrap(), 1);
        assert!(!fresh.is_replay_registered());
        assert!(!fresh.restore_registration().await.unwrap());
    }
}
