//! # Strategy Executor
//!
//! Serves a request through the strategy of the tier it classifies into.
//!
//! | Tier | Strategy |
//! |------|----------|
//! | static, font, image | cache-first |
//! | api | network-first with fallback |
//! | dynamic | stale-while-revalidate |
//! | uncacheable | network only, offline fallback |
//! | generic | network, any cached copy, offline fallback |
//!
//! Only a transport failure (`Err` from the [`HttpClient`]) triggers fallback.
//! A received 4xx/5xx is passed through unchanged and never cached.
//! [`StrategyExecutor::handle`] never fails: every path ends in a response.

use bridge_traits::{
    error::Result as BridgeResult,
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    storage::KeyedBlobStore,
    time::Clock,
};
use core_runtime::{
    config::CoreConfig,
    events::{CoreEvent, EventBus, UpdateSource},
    metrics::PerformanceMetrics,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::classifier::{RequestClassifier, Route};
use crate::entry::CacheEntry;
use crate::error::{CacheError, Result};
use crate::offline::OfflineResponses;
use crate::store::CacheStore;
use crate::tier::{CacheTier, Strategy, TierTable};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache { stale: bool },
    Offline,
}

#[derive(Debug, Clone)]
pub struct ServedResponse {
    pub response: HttpResponse,
    pub source: ResponseSource,
    pub route: Route,
}

impl ServedResponse {
    fn network(response: HttpResponse, route: Route) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
            route,
        }
    }

    fn cached(entry: CacheEntry, stale: bool, route: Route) -> Self {
        Self {
            response: entry.into_response(),
            source: ResponseSource::Cache { stale },
            route,
        }
    }

    fn offline(response: HttpResponse, route: Route) -> Self {
        Self {
            response,
            source: ResponseSource::Offline,
            route,
        }
    }
}

/// Result of an install-time precache pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub stored: Vec<String>,
    pub failed: Vec<String>,
}

struct Inner {
    origin: Url,
    http: Arc<dyn HttpClient>,
    store: CacheStore,
    classifier: RequestClassifier,
    offline: OfflineResponses,
    events: EventBus,
    metrics: Arc<PerformanceMetrics>,
    request_timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct StrategyExecutor {
    inner: Arc<Inner>,
}

impl StrategyExecutor {
    pub fn new(
        config: &CoreConfig,
        http: Arc<dyn HttpClient>,
        blobs: Arc<dyn KeyedBlobStore>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        metrics: Arc<PerformanceMetrics>,
    ) -> Result<Self> {
        let classifier = RequestClassifier::new(&config.origin, &config.classification)?;
        let store = CacheStore::new(
            blobs,
            TierTable::new(&config.cache_version, &config.cache_limits),
            clock,
        );
        let offline = OfflineResponses::new(&config.origin, config.offline.clone(), store.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                origin: config.origin.clone(),
                http,
                store,
                classifier,
                offline,
                events,
                metrics,
                request_timeout: config.request_timeout,
            }),
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.inner.classifier
    }

    pub fn offline(&self) -> &OfflineResponses {
        &self.inner.offline
    }

    /// Absolute URL for `url`, relative references resolve against the origin.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.inner
            .origin
            .join(url)
            .map_err(|e| CacheError::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// One origin request, counted in `networkRequests`.
    ///
    /// The configured request timeout applies unless the request sets its own.
    pub async fn fetch(&self, mut request: HttpRequest) -> BridgeResult<HttpResponse> {
        if request.timeout.is_none() {
            request.timeout = self.inner.request_timeout;
        }
        self.inner.metrics.record_network_request();
        self.inner.http.execute(request).await
    }

    /// Serve `request` through its tier's strategy.
    #[instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn handle(&self, mut request: HttpRequest) -> ServedResponse {
        let url = match self.resolve(&request.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Unresolvable request URL, passing through");
                return match self.fetch(request).await {
                    Ok(response) => ServedResponse::network(response, Route::Uncacheable),
                    Err(_) => ServedResponse::offline(
                        self.inner.offline.document().await,
                        Route::Uncacheable,
                    ),
                };
            }
        };
        request.url = url.to_string();

        let route = self.inner.classifier.classify(request.method, &url);
        debug!(?route, "Classified request");

        match route {
            Route::Cached(tier) => match tier.strategy() {
                Strategy::CacheFirst => self.cache_first(tier, request, &url).await,
                Strategy::NetworkFirst => self.network_first(tier, request, &url).await,
                Strategy::StaleWhileRevalidate => {
                    self.stale_while_revalidate(tier, request, &url).await
                }
            },
            Route::Uncacheable => self.passthrough(request, &url).await,
            Route::Generic => self.generic(request, &url).await,
        }
    }

    async fn cache_first(&self, tier: CacheTier, request: HttpRequest, url: &Url) -> ServedResponse {
        let route = Route::Cached(tier);
        let store = &self.inner.store;

        let stale = match store.lookup(tier, url).await {
            Some(entry) if !self.is_expired(tier, &entry) => {
                self.inner.metrics.record_cache_hit();
                return ServedResponse::cached(entry, false, route);
            }
            other => other,
        };
        self.inner.metrics.record_cache_miss();

        match self.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    store.write(tier, url, &response).await;
                }
                ServedResponse::network(response, route)
            }
            Err(e) => {
                debug!(%tier, error = %e, "Origin unreachable");
                if let Some(entry) = stale {
                    return ServedResponse::cached(entry, true, route);
                }
                let placeholder = match tier {
                    CacheTier::Image => self.inner.offline.image_placeholder(),
                    _ => self.inner.offline.document().await,
                };
                ServedResponse::offline(placeholder, route)
            }
        }
    }

    async fn network_first(&self, tier: CacheTier, request: HttpRequest, url: &Url) -> ServedResponse {
        let route = Route::Cached(tier);

        match self.fetch(request).await {
            Ok(response) => {
                if response.is_success() && self.inner.store.write(tier, url, &response).await {
                    self.announce(url, UpdateSource::Network);
                }
                ServedResponse::network(response, route)
            }
            Err(e) => {
                debug!(%tier, error = %e, "Origin unreachable, trying cache");
                match self.inner.store.lookup_fresh(tier, url).await {
                    Some(entry) => {
                        self.inner.metrics.record_cache_hit();
                        self.announce(url, UpdateSource::Cache);
                        ServedResponse::cached(entry, false, route)
                    }
                    None => {
                        self.inner.metrics.record_cache_miss();
                        ServedResponse::offline(self.inner.offline.api(url), route)
                    }
                }
            }
        }
    }

    async fn stale_while_revalidate(
        &self,
        tier: CacheTier,
        request: HttpRequest,
        url: &Url,
    ) -> ServedResponse {
        let route = Route::Cached(tier);
        let store = &self.inner.store;

        let stale = match store.lookup(tier, url).await {
            Some(entry) if !self.is_expired(tier, &entry) => {
                self.inner.metrics.record_cache_hit();
                self.revalidate(tier, request, url.clone());
                return ServedResponse::cached(entry, false, route);
            }
            other => other,
        };
        self.inner.metrics.record_cache_miss();

        match self.fetch(request).await {
            Ok(response) => {
                if response.is_success() && store.write(tier, url, &response).await {
                    self.announce(url, UpdateSource::Network);
                }
                ServedResponse::network(response, route)
            }
            Err(e) => {
                debug!(%tier, error = %e, "Origin unreachable");
                match stale {
                    Some(entry) => ServedResponse::cached(entry, true, route),
                    None => ServedResponse::offline(self.inner.offline.document().await, route),
                }
            }
        }
    }

    /// Background refresh after a fresh hit. Its outcome never reaches the caller.
    fn revalidate(&self, tier: CacheTier, request: HttpRequest, url: Url) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(url = %url, "No runtime available, skipping revalidation");
            return;
        };

        let executor = self.clone();
        handle.spawn(async move {
            match executor.fetch(request).await {
                Ok(response) if response.is_success() => {
                    if executor.inner.store.write(tier, &url, &response).await {
                        executor.announce(&url, UpdateSource::Network);
                    }
                }
                Ok(response) => {
                    debug!(url = %url, status = response.status, "Revalidation kept cached copy")
                }
                Err(e) => debug!(url = %url, error = %e, "Revalidation failed"),
            }
        });
    }

    async fn passthrough(&self, request: HttpRequest, url: &Url) -> ServedResponse {
        match self.fetch(request).await {
            Ok(response) => ServedResponse::network(response, Route::Uncacheable),
            Err(e) => {
                debug!(error = %e, "Origin unreachable for uncacheable request");
                ServedResponse::offline(self.inner.offline.for_path(url).await, Route::Uncacheable)
            }
        }
    }

    async fn generic(&self, request: HttpRequest, url: &Url) -> ServedResponse {
        match self.fetch(request).await {
            Ok(response) => ServedResponse::network(response, Route::Generic),
            Err(e) => {
                debug!(error = %e, "Origin unreachable, trying any cached copy");
                match self.inner.store.lookup_any(url).await {
                    Some(entry) => {
                        self.inner.metrics.record_cache_hit();
                        ServedResponse::cached(entry, false, Route::Generic)
                    }
                    None => {
                        self.inner.metrics.record_cache_miss();
                        ServedResponse::offline(self.inner.offline.for_path(url).await, Route::Generic)
                    }
                }
            }
        }
    }

    /// Fetch and store shell assets.
    ///
    /// The offline document goes to the offline-fallback tier, everything else
    /// to the tier it classifies into (static when it has none). Failures are
    /// logged and reported, never fatal.
    #[instrument(skip(self, urls), fields(count = urls.len()))]
    pub async fn precache(&self, urls: &[String]) -> PrecacheReport {
        let mut report = PrecacheReport::default();

        for raw in urls {
            let url = match self.resolve(raw) {
                Ok(url) => url,
                Err(e) => {
                    warn!(url = %raw, error = %e, "Skipping precache entry");
                    report.failed.push(raw.clone());
                    continue;
                }
            };

            let tier = if url == *self.inner.offline.document_url() {
                CacheTier::OfflineFallback
            } else {
                self.inner
                    .classifier
                    .classify(HttpMethod::Get, &url)
                    .tier()
                    .unwrap_or(CacheTier::Static)
            };

            match self.fetch(HttpRequest::get(url.as_str())).await {
                Ok(response) if response.is_success() => {
                    if self.inner.store.write(tier, &url, &response).await {
                        report.stored.push(url.to_string());
                    } else {
                        report.failed.push(url.to_string());
                    }
                }
                Ok(response) => {
                    warn!(url = %url, status = response.status, "Precache fetch rejected");
                    report.failed.push(url.to_string());
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Precache fetch failed");
                    report.failed.push(url.to_string());
                }
            }
        }

        info!(
            stored = report.stored.len(),
            failed = report.failed.len(),
            "Precache finished"
        );
        report
    }

    /// Store an application-supplied response in the api tier.
    pub async fn cache_api_response(&self, url: &str, response: &HttpResponse) -> Result<bool> {
        let url = self.resolve(url)?;
        let refuse = |reason: &str| CacheError::Refused {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        if self.inner.classifier.is_denied(&url) {
            return Err(refuse("matches an API deny pattern"));
        }
        if !self.inner.classifier.accepts_api_response(&url) {
            return Err(refuse("not an api-tier URL"));
        }
        if !response.is_success() {
            return Err(refuse("only 2xx responses are cached"));
        }

        Ok(self.inner.store.write(CacheTier::Api, &url, response).await)
    }

    /// Empty every cache store.
    pub async fn clear_all(&self) -> Result<u64> {
        self.inner.store.clear_all().await
    }

    /// Delete stores left behind by earlier cache versions.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.inner.store.delete_stale_versions().await
    }

    fn is_expired(&self, tier: CacheTier, entry: &CacheEntry) -> bool {
        let store = &self.inner.store;
        entry.is_expired(store.now(), store.policy(tier).max_age)
    }

    fn announce(&self, url: &Url, source: UpdateSource) {
        self.inner.events.broadcast(CoreEvent::CacheUpdate {
            url: url.to_string(),
            source,
        });
    }
}
