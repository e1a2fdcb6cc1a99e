//! # Core Configuration Module
//!
//! Provides configuration management for the offline cache-and-sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every policy knob the core reads: the origin the worker fronts,
//! where durable state lives, per-tier cache limits, the URL classification
//! tables, offline fallback shapes and background task intervals.
//! Validation is fail-fast: `build()` refuses configurations the core could
//! not run with and says which builder call fixes it.
//!
//! Host capabilities (HTTP client, storage adapters) are not part of the
//! configuration; they are wired by `core-service` at bootstrap.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .origin("https://desk.example.com")
//!     .database_path("/var/lib/desk/offline.db")
//!     .cache_version("v2")
//!     .precache_urls(["/", "/offline", "/manifest.json"])
//!     .metrics_interval(Some(Duration::from_secs(30)))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing origin
//! let config = CoreConfig::builder()
//!     .database_path("/tmp/offline.db")
//!     .build()
//!     .expect("Should fail - origin is required");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DAY: u64 = 24 * 60 * 60;

/// Default capacity of the broadcast channel
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Default interval between performance metric broadcasts
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(60);

/// Age and size bounds for one cache tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub max_age: Duration,
    pub max_entries: usize,
}

impl TierLimits {
    pub const fn new(max_age: Duration, max_entries: usize) -> Self {
        Self {
            max_age,
            max_entries,
        }
    }
}

/// Per-tier limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLimits {
    pub static_assets: TierLimits,
    pub dynamic: TierLimits,
    pub api: TierLimits,
    pub image: TierLimits,
    pub font: TierLimits,
    pub offline_fallback: TierLimits,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            static_assets: TierLimits::new(Duration::from_secs(30 * DAY), 100),
            dynamic: TierLimits::new(Duration::from_secs(DAY), 50),
            api: TierLimits::new(Duration::from_secs(5 * 60), 100),
            image: TierLimits::new(Duration::from_secs(7 * DAY), 60),
            font: TierLimits::new(Duration::from_secs(365 * DAY), 30),
            offline_fallback: TierLimits::new(Duration::from_secs(365 * DAY), 20),
        }
    }
}

impl CacheLimits {
    fn named(&self) -> [(&'static str, TierLimits); 6] {
        [
            ("static", self.static_assets),
            ("dynamic", self.dynamic),
            ("api", self.api),
            ("image", self.image),
            ("font", self.font),
            ("offline-fallback", self.offline_fallback),
        ]
    }
}

/// Pattern tables used by the request classifier.
///
/// Path patterns are matched segment by segment against the URL path:
/// `/api/tickets` matches `/api/tickets` and `/api/tickets/42`, and `*`
/// matches exactly one segment (`/api/tickets/*/comments`). The single
/// pattern `/` matches only the root path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationConfig {
    /// Path prefixes served by the static tier
    pub static_prefixes: Vec<String>,
    /// File extensions (without dot) served by the static tier
    pub static_extensions: Vec<String>,
    /// Hosts serving web fonts, cacheable even though cross-origin
    pub font_hosts: Vec<String>,
    pub font_extensions: Vec<String>,
    /// API endpoints whose GET responses may be cached
    pub api_allow: Vec<String>,
    /// API endpoints that must never be cached; checked before `api_allow`
    pub api_deny: Vec<String>,
    pub image_extensions: Vec<String>,
    /// Application pages served stale-while-revalidate
    pub dynamic_routes: Vec<String>,
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            static_prefixes: strings(["/_next/static", "/static", "/assets"]),
            static_extensions: strings(["js", "mjs", "css", "map", "webmanifest"]),
            font_hosts: strings(["fonts.googleapis.com", "fonts.gstatic.com"]),
            font_extensions: strings(["woff", "woff2", "ttf", "otf", "eot"]),
            api_allow: strings([
                "/api/tickets",
                "/api/users",
                "/api/notifications",
                "/api/knowledge-base",
                "/api/dashboard",
            ]),
            api_deny: strings([
                "/api/auth/login",
                "/api/auth/logout",
                "/api/auth/register",
                "/api/auth/refresh",
                "/api/tickets/*/comments",
                "/api/tickets/*/attachments",
                "/api/tickets/create",
                "/api/upload",
                "/api/attachments",
            ]),
            image_extensions: strings(["png", "jpg", "jpeg", "gif", "webp", "svg", "avif", "ico"]),
            dynamic_routes: strings([
                "/",
                "/dashboard",
                "/tickets",
                "/knowledge-base",
                "/notifications",
                "/settings",
            ]),
        }
    }
}

impl ClassificationConfig {
    fn path_patterns(&self) -> impl Iterator<Item = (&'static str, &String)> {
        self.static_prefixes
            .iter()
            .map(|p| ("static_prefixes", p))
            .chain(self.api_allow.iter().map(|p| ("api_allow", p)))
            .chain(self.api_deny.iter().map(|p| ("api_deny", p)))
            .chain(self.dynamic_routes.iter().map(|p| ("dynamic_routes", p)))
    }
}

/// A list endpoint and the JSON key its offline placeholder uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEndpoint {
    pub path: String,
    pub entity: String,
}

impl ListEndpoint {
    pub fn new(path: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entity: entity.into(),
        }
    }
}

/// Shapes of responses synthesized when the origin is unreachable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineConfig {
    /// Endpoints answered with `{<entity>: [], offline: true, ...}`
    pub list_endpoints: Vec<ListEndpoint>,
    /// Endpoints answered with `{user: null, offline: true}`
    pub identity_endpoints: Vec<String>,
    /// Path of the offline HTML document, precached into the offline-fallback tier
    pub offline_document: String,
    pub message: String,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            list_endpoints: vec![
                ListEndpoint::new("/api/tickets", "tickets"),
                ListEndpoint::new("/api/notifications", "notifications"),
                ListEndpoint::new("/api/users", "users"),
                ListEndpoint::new("/api/knowledge-base", "articles"),
            ],
            identity_endpoints: strings(["/api/auth/verify", "/api/auth/me"]),
            offline_document: "/offline".to_string(),
            message: "You are offline. Showing cached data when available.".to_string(),
        }
    }
}

/// Values used when a push payload omits them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDefaults {
    pub title: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
}

impl Default for NotificationDefaults {
    fn default() -> Self {
        Self {
            title: "New notification".to_string(),
            icon: Some("/icons/icon-192x192.png".to_string()),
            badge: Some("/icons/badge-72x72.png".to_string()),
        }
    }
}

/// Periodic refresh of the notifications endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPollConfig {
    pub url: String,
    pub interval: Duration,
}

/// Core configuration for the offline worker.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Origin the worker fronts; same-origin checks and relative URLs resolve against it
    pub origin: Url,

    /// SQLite file holding cache entries and the offline queue. `None` keeps
    /// everything in memory (tests only: nothing survives a restart).
    pub database_path: Option<PathBuf>,

    /// Suffix of every cache store name (`static-v1`, `api-v1`, ...)
    pub cache_version: String,

    pub cache_limits: CacheLimits,
    pub classification: ClassificationConfig,
    pub offline: OfflineConfig,

    /// Shell assets fetched on install
    pub precache_urls: Vec<String>,

    pub notification_defaults: NotificationDefaults,

    /// Broadcast channel capacity
    pub event_buffer_size: usize,

    /// Interval of the metrics reporter, `None` disables it
    pub metrics_interval: Option<Duration>,

    pub notification_poll: Option<NotificationPollConfig>,

    /// Overall timeout for origin requests. `None` leaves requests bounded
    /// only by the transport's own connect and read behavior.
    pub request_timeout: Option<Duration>,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.origin.scheme(), "http" | "https") || self.origin.host().is_none() {
            return Err(Error::Config(format!(
                "Origin must be an absolute http(s) URL, got '{}'",
                self.origin
            )));
        }

        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if self.cache_version.is_empty()
            || !self
                .cache_version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        {
            return Err(Error::Config(format!(
                "Cache version '{}' must be non-empty and contain only letters, digits, '.' or '_'",
                self.cache_version
            )));
        }

        for (tier, limits) in self.cache_limits.named() {
            if limits.max_entries == 0 {
                return Err(Error::Config(format!(
                    "Cache tier '{}' must allow at least one entry",
                    tier
                )));
            }
            if limits.max_age.is_zero() {
                return Err(Error::Config(format!(
                    "Cache tier '{}' must have a non-zero max age",
                    tier
                )));
            }
        }

        for (table, pattern) in self.classification.path_patterns() {
            if !pattern.starts_with('/') {
                return Err(Error::Config(format!(
                    "Pattern '{}' in {} must start with '/'",
                    pattern, table
                )));
            }
        }

        if !self.offline.offline_document.starts_with('/') {
            return Err(Error::Config(
                "Offline document must be an origin-relative path such as '/offline'".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if matches!(self.metrics_interval, Some(interval) if interval.is_zero()) {
            return Err(Error::Config(
                "Metrics interval must be non-zero. Pass None to disable the reporter.".to_string(),
            ));
        }

        if let Some(poll) = &self.notification_poll {
            if poll.interval.is_zero() {
                return Err(Error::Config(
                    "Notification poll interval must be non-zero".to_string(),
                ));
            }
            self.resolve(&poll.url)?;
        }

        if matches!(self.request_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(Error::Config(
                "Request timeout must be non-zero. Pass None to disable it.".to_string(),
            ));
        }

        for url in &self.precache_urls {
            self.resolve(url)?;
        }

        Ok(())
    }

    /// Resolve an absolute or origin-relative URL
    pub fn resolve(&self, url: &str) -> Result<Url> {
        self.origin
            .join(url)
            .map_err(|e| Error::Config(format!("Invalid URL '{}': {}", url, e)))
    }
}

/// Builder for [`CoreConfig`]
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    origin: Option<String>,
    database_path: Option<PathBuf>,
    in_memory: bool,
    cache_version: Option<String>,
    cache_limits: Option<CacheLimits>,
    classification: Option<ClassificationConfig>,
    offline: Option<OfflineConfig>,
    precache_urls: Vec<String>,
    notification_defaults: Option<NotificationDefaults>,
    event_buffer_size: Option<usize>,
    metrics_interval: Option<Option<Duration>>,
    notification_poll: Option<NotificationPollConfig>,
    request_timeout: Option<Duration>,
}

impl CoreConfigBuilder {
    /// Sets the origin (e.g. `https://desk.example.com`).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Sets the SQLite database path.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Keep all durable state in memory. Intended for tests.
    pub fn in_memory_storage(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Sets the cache version suffix.
    ///
    /// Default: `v1`
    pub fn cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache_version = Some(version.into());
        self
    }

    pub fn cache_limits(mut self, limits: CacheLimits) -> Self {
        self.cache_limits = Some(limits);
        self
    }

    pub fn classification(mut self, classification: ClassificationConfig) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn offline(mut self, offline: OfflineConfig) -> Self {
        self.offline = Some(offline);
        self
    }

    pub fn precache_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn notification_defaults(mut self, defaults: NotificationDefaults) -> Self {
        self.notification_defaults = Some(defaults);
        self
    }

    /// Sets the broadcast channel capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the metrics broadcast interval; `None` disables the reporter.
    ///
    /// Default: 60 seconds
    pub fn metrics_interval(mut self, interval: Option<Duration>) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    /// Poll `url` every `interval` and broadcast the notifications it returns.
    pub fn notification_poll(mut self, url: impl Into<String>, interval: Duration) -> Self {
        self.notification_poll = Some(NotificationPollConfig {
            url: url.into(),
            interval,
        });
        self
    }

    /// Abort origin requests after `timeout`.
    ///
    /// Default: no timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let origin = self.origin.ok_or_else(|| {
            Error::Config(
                "Origin is required. Use .origin(\"https://your-app.example\") to set it."
                    .to_string(),
            )
        })?;
        let origin = Url::parse(&origin)
            .map_err(|e| Error::Config(format!("Invalid origin '{}': {}", origin, e)))?;

        if self.database_path.is_none() && !self.in_memory {
            return Err(Error::Config(
                "Database path is required. Use .database_path() to set it, \
                 or .in_memory_storage() for tests."
                    .to_string(),
            ));
        }

        let config = CoreConfig {
            origin,
            database_path: self.database_path,
            cache_version: self.cache_version.unwrap_or_else(|| "v1".to_string()),
            cache_limits: self.cache_limits.unwrap_or_default(),
            classification: self.classification.unwrap_or_default(),
            offline: self.offline.unwrap_or_default(),
            precache_urls: self.precache_urls,
            notification_defaults: self.notification_defaults.unwrap_or_default(),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(Some(DEFAULT_METRICS_INTERVAL)),
            notification_poll: self.notification_poll,
            request_timeout: self.request_timeout,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CoreConfigBuilder {
        CoreConfig::builder()
            .origin("https://desk.example.com")
            .in_memory_storage()
    }

    #[test]
    fn test_builder_defaults() {
        let config = base().build().unwrap();

        assert_eq!(config.cache_version, "v1");
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.metrics_interval, Some(DEFAULT_METRICS_INTERVAL));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.cache_limits.api.max_age, Duration::from_secs(300));
        assert_eq!(config.cache_limits.dynamic.max_entries, 50);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_builder_requires_origin() {
        let result = CoreConfig::builder().in_memory_storage().build();

        assert!(result.unwrap_err().to_string().contains("Origin is required"));
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .origin("https://desk.example.com")
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_rejects_relative_origin() {
        assert!(CoreConfig::builder()
            .origin("desk.example.com")
            .in_memory_storage()
            .build()
            .is_err());
        assert!(CoreConfig::builder()
            .origin("file:///tmp/app")
            .in_memory_storage()
            .build()
            .is_err());
    }

    #[test]
    fn test_rejects_zero_tier_capacity() {
        let mut limits = CacheLimits::default();
        limits.image.max_entries = 0;

        let err = base().cache_limits(limits).build().unwrap_err();
        assert!(err.to_string().contains("'image'"));
    }

    #[test]
    fn test_rejects_pattern_without_leading_slash() {
        let mut classification = ClassificationConfig::default();
        classification.api_deny.push("api/upload".to_string());

        let err = base().classification(classification).build().unwrap_err();
        assert!(err.to_string().contains("api_deny"));
    }

    #[test]
    fn test_rejects_bad_cache_version() {
        assert!(base().cache_version("v 2").build().is_err());
        assert!(base().cache_version("").build().is_err());
        assert!(base().cache_version("v2.1").build().is_ok());
    }

    #[test]
    fn test_metrics_interval_can_be_disabled() {
        let config = base().metrics_interval(None).build().unwrap();
        assert_eq!(config.metrics_interval, None);

        assert!(base()
            .metrics_interval(Some(Duration::ZERO))
            .build()
            .is_err());
    }

    #[test]
    fn test_default_deny_list_covers_auth_and_uploads() {
        let deny = ClassificationConfig::default().api_deny;

        for required in [
            "/api/auth/login",
            "/api/auth/logout",
            "/api/tickets/*/comments",
            "/api/upload",
        ] {
            assert!(deny.iter().any(|p| p == required), "missing {}", required);
        }
    }

    #[test]
    fn test_resolve_relative_urls() {
        let config = base().build().unwrap();

        assert_eq!(
            config.resolve("/api/tickets").unwrap().as_str(),
            "https://desk.example.com/api/tickets"
        );
        assert_eq!(
            config.resolve("https://cdn.example.com/a.js").unwrap().host_str(),
            Some("cdn.example.com")
        );
    }
}
