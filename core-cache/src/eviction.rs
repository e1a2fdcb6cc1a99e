use bridge_traits::storage::KeyedBlobStore;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::tier::TierPolicy;

/// Keeps every tier at or under its entry cap by dropping the oldest writes.
#[derive(Clone)]
pub struct EvictionManager {
    store: Arc<dyn KeyedBlobStore>,
}

impl EvictionManager {
    pub fn new(store: Arc<dyn KeyedBlobStore>) -> Self {
        Self { store }
    }

    /// Trim `policy`'s store to `max_entries`, returning how many entries were removed.
    pub async fn enforce(&self, policy: &TierPolicy) -> Result<usize> {
        let keys = self.store.list_keys(&policy.store_name).await?;
        if keys.len() <= policy.max_entries {
            return Ok(0);
        }

        let excess = keys.len() - policy.max_entries;
        let mut removed = 0;
        for key in keys.iter().take(excess) {
            if self.store.delete(&policy.store_name, key).await? {
                removed += 1;
            }
        }

        debug!(
            store = %policy.store_name,
            removed,
            max_entries = policy.max_entries,
            "Evicted oldest cache entries"
        );
        Ok(removed)
    }
}
