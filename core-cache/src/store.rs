//! Tiered cache store
//!
//! Wraps a [`KeyedBlobStore`] with tier policies. Storage faults never reach
//! the caller as errors on the request path: a failed read is a miss and a
//! failed write is skipped, both logged at `warn`.

use bridge_traits::{http::HttpResponse, storage::KeyedBlobStore, time::Clock};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entry::{request_key, CacheEntry};
use crate::error::Result;
use crate::eviction::EvictionManager;
use crate::tier::{CacheTier, TierPolicy, TierTable};
use url::Url;

#[derive(Clone)]
pub struct CacheStore {
    blobs: Arc<dyn KeyedBlobStore>,
    tiers: Arc<TierTable>,
    eviction: EvictionManager,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(blobs: Arc<dyn KeyedBlobStore>, tiers: TierTable, clock: Arc<dyn Clock>) -> Self {
        Self {
            eviction: EvictionManager::new(blobs.clone()),
            blobs,
            tiers: Arc::new(tiers),
            clock,
        }
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn policy(&self, tier: CacheTier) -> &TierPolicy {
        self.tiers.policy(tier)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Cached entry for `url` in `tier`, regardless of age.
    pub async fn lookup(&self, tier: CacheTier, url: &Url) -> Option<CacheEntry> {
        let policy = self.tiers.policy(tier);
        let key = request_key(url);

        match self.blobs.get(&policy.store_name, &key).await {
            Ok(blob) => blob.map(|blob| CacheEntry::from_blob(key, blob)),
            Err(e) => {
                warn!(store = %policy.store_name, url = %url, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Cached entry for `url` in `tier` only if it is within the tier's max age.
    pub async fn lookup_fresh(&self, tier: CacheTier, url: &Url) -> Option<CacheEntry> {
        let max_age = self.tiers.policy(tier).max_age;
        let now = self.now();
        self.lookup(tier, url)
            .await
            .filter(|entry| !entry.is_expired(now, max_age))
    }

    /// First cached entry for `url` in any tier, stale entries included.
    pub async fn lookup_any(&self, url: &Url) -> Option<CacheEntry> {
        for tier in CacheTier::ALL {
            if let Some(entry) = self.lookup(tier, url).await {
                return Some(entry);
            }
        }
        None
    }

    /// Write `response` for `url` into `tier`, then enforce the tier's cap.
    ///
    /// Returns whether the entry was stored.
    pub async fn write(&self, tier: CacheTier, url: &Url, response: &HttpResponse) -> bool {
        let policy = self.tiers.policy(tier);
        let entry = CacheEntry::from_response(request_key(url), response, self.now());

        if let Err(e) = self
            .blobs
            .put(&policy.store_name, &entry.request_key, entry.to_blob())
            .await
        {
            warn!(store = %policy.store_name, url = %url, error = %e, "Cache write failed, skipping");
            return false;
        }

        debug!(store = %policy.store_name, url = %url, "Cached response");

        if let Err(e) = self.eviction.enforce(policy).await {
            warn!(store = %policy.store_name, error = %e, "Eviction failed");
        }
        true
    }

    /// Number of entries in a tier.
    pub async fn len(&self, tier: CacheTier) -> Result<usize> {
        let policy = self.tiers.policy(tier);
        Ok(self.blobs.list_keys(&policy.store_name).await?.len())
    }

    /// Empty every store, current version or not. Returns the number of entries removed.
    pub async fn clear_all(&self) -> Result<u64> {
        let mut removed = 0;
        for namespace in self.blobs.list_namespaces().await? {
            removed += self.blobs.clear_namespace(&namespace).await?;
        }
        info!(removed, "Cleared all caches");
        Ok(removed)
    }

    /// Drop stores left behind by previous cache versions.
    pub async fn delete_stale_versions(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for namespace in self.blobs.list_namespaces().await? {
            if self.tiers.owns_store(&namespace) {
                continue;
            }
            let removed = self.blobs.clear_namespace(&namespace).await?;
            info!(store = %namespace, removed, "Deleted stale cache store");
            deleted.push(namespace);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::StoredBlob;
    use bridge_traits::time::ManualClock;
    use core_runtime::config::{CacheLimits, TierLimits};
    use mockall::mock;
    use std::time::Duration;

    mock! {
        Blobs {}

        #[async_trait]
        impl KeyedBlobStore for Blobs {
            async fn get(&self, namespace: &str, key: &str) -> BridgeResult<Option<StoredBlob>>;
            async fn put(&self, namespace: &str, key: &str, blob: StoredBlob) -> BridgeResult<()>;
            async fn delete(&self, namespace: &str, key: &str) -> BridgeResult<bool>;
            async fn list_keys(&self, namespace: &str) -> BridgeResult<Vec<String>>;
            async fn list_namespaces(&self) -> BridgeResult<Vec<String>>;
            async fn clear_namespace(&self, namespace: &str) -> BridgeResult<u64>;
        }
    }

    fn store_with(blobs: MockBlobs, limits: CacheLimits) -> CacheStore {
        CacheStore::new(
            Arc::new(blobs),
            TierTable::new("v1", &limits),
            Arc::new(ManualClock::default()),
        )
    }

    fn url(path: &str) -> Url {
        Url::parse("https://desk.example.com").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_read_failure_is_a_miss() {
        let mut blobs = MockBlobs::new();
        blobs
            .expect_get()
            .returning(|_, _| Err(BridgeError::DatabaseError("disk I/O error".into())));

        let store = store_with(blobs, CacheLimits::default());
        assert!(store.lookup(CacheTier::Api, &url("/api/tickets")).await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_skipped() {
        let mut blobs = MockBlobs::new();
        blobs
            .expect_put()
            .returning(|_, _, _| Err(BridgeError::DatabaseError("quota exceeded".into())));
        blobs.expect_list_keys().never();

        let store = store_with(blobs, CacheLimits::default());
        let written = store
            .write(CacheTier::Api, &url("/api/tickets"), &HttpResponse::new(200))
            .await;
        assert!(!written);
    }

    #[tokio::test]
    async fn test_write_evicts_oldest_over_cap() {
        let limits = CacheLimits {
            api: TierLimits::new(Duration::from_secs(300), 2),
            ..CacheLimits::default()
        };

        let mut blobs = MockBlobs::new();
        blobs.expect_put().returning(|_, _, _| Ok(()));
        blobs.expect_list_keys().returning(|_| {
            Ok(vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()])
        });
        blobs
            .expect_delete()
            .withf(|namespace, key| namespace == "api-v1" && (key == "a" || key == "b"))
            .times(2)
            .returning(|_, _| Ok(true));

        let store = store_with(blobs, limits);
        assert!(
            store
                .write(CacheTier::Api, &url("/api/tickets"), &HttpResponse::new(200))
                .await
        );
    }

    #[tokio::test]
    async fn test_delete_stale_versions_keeps_current() {
        let mut blobs = MockBlobs::new();
        blobs.expect_list_namespaces().returning(|| {
            Ok(vec!["api-v0".to_string(), "api-v1".to_string(), "static-v0".to_string()])
        });
        blobs
            .expect_clear_namespace()
            .withf(|namespace| namespace.ends_with("-v0"))
            .times(2)
            .returning(|_| Ok(3));

        let store = store_with(blobs, CacheLimits::default());
        let deleted = store.delete_stale_versions().await.unwrap();
        assert_eq!(deleted, vec!["api-v0".to_string(), "static-v0".to_string()]);
    }
}
