//! Request classification
//!
//! Maps a request (method + URL) to the cache tier that serves it. The
//! decision order is fixed:
//!
//! 1. non-GET requests and foreign origins (other than font hosts) bypass caching
//! 2. static prefix or extension → static
//! 3. font host or font extension → font
//! 4. API deny pattern → uncacheable (deny always beats allow)
//! 5. API allow pattern → api
//! 6. image extension → image
//! 7. dynamic route → dynamic
//! 8. anything else → generic passthrough with best-effort fallback

use bridge_traits::http::HttpMethod;
use core_runtime::config::ClassificationConfig;
use std::collections::HashSet;
use url::Url;

use crate::error::Result;
use crate::pattern::{extension_of, PatternSet};
use crate::tier::CacheTier;

/// Outcome of classifying a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Served by the tier's strategy
    Cached(CacheTier),
    /// Straight to the network; never read from or written to any store
    Uncacheable,
    /// Network first, no write-through, any cached copy as fallback
    Generic,
}

impl Route {
    pub fn tier(&self) -> Option<CacheTier> {
        match self {
            Route::Cached(tier) => Some(*tier),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Url,
    static_prefixes: PatternSet,
    static_extensions: HashSet<String>,
    font_hosts: HashSet<String>,
    font_extensions: HashSet<String>,
    api_allow: PatternSet,
    api_deny: PatternSet,
    image_extensions: HashSet<String>,
    dynamic_routes: PatternSet,
}

fn lowercase_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|s| s.trim_start_matches('.').to_ascii_lowercase())
        .collect()
}

impl RequestClassifier {
    pub fn new(origin: &Url, config: &ClassificationConfig) -> Result<Self> {
        Ok(Self {
            origin: origin.clone(),
            static_prefixes: PatternSet::parse(&config.static_prefixes)?,
            static_extensions: lowercase_set(&config.static_extensions),
            font_hosts: lowercase_set(&config.font_hosts),
            font_extensions: lowercase_set(&config.font_extensions),
            api_allow: PatternSet::parse(&config.api_allow)?,
            api_deny: PatternSet::parse(&config.api_deny)?,
            image_extensions: lowercase_set(&config.image_extensions),
            dynamic_routes: PatternSet::parse(&config.dynamic_routes)?,
        })
    }

    pub fn classify(&self, method: HttpMethod, url: &Url) -> Route {
        if method != HttpMethod::Get || !matches!(url.scheme(), "http" | "https") {
            return Route::Uncacheable;
        }

        let font_host = url
            .host_str()
            .is_some_and(|host| self.font_hosts.contains(&host.to_ascii_lowercase()));
        let same_origin = self.is_same_origin(url);

        if !same_origin && !font_host {
            return Route::Uncacheable;
        }

        let path = url.path();
        let extension = extension_of(path);
        let has_ext = |set: &HashSet<String>| extension.as_ref().is_some_and(|e| set.contains(e));

        if same_origin && (self.static_prefixes.matches(path) || has_ext(&self.static_extensions)) {
            return Route::Cached(CacheTier::Static);
        }

        if font_host || has_ext(&self.font_extensions) {
            return Route::Cached(CacheTier::Font);
        }

        if self.api_deny.matches(path) {
            return Route::Uncacheable;
        }

        if self.api_allow.matches(path) {
            return Route::Cached(CacheTier::Api);
        }

        if has_ext(&self.image_extensions) {
            return Route::Cached(CacheTier::Image);
        }

        if self.dynamic_routes.matches(path) {
            return Route::Cached(CacheTier::Dynamic);
        }

        Route::Generic
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Whether an application-supplied response for `url` may enter the api tier
    pub fn accepts_api_response(&self, url: &Url) -> bool {
        self.classify(HttpMethod::Get, url) == Route::Cached(CacheTier::Api)
    }

    pub fn is_denied(&self, url: &Url) -> bool {
        self.is_same_origin(url) && self.api_deny.matches(url.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        let origin = Url::parse("https://desk.example.com").unwrap();
        RequestClassifier::new(&origin, &ClassificationConfig::default()).unwrap()
    }

    fn get(path: &str) -> Route {
        let url = Url::parse("https://desk.example.com")
            .unwrap()
            .join(path)
            .unwrap();
        classifier().classify(HttpMethod::Get, &url)
    }

    #[test]
    fn test_reference_routes() {
        assert_eq!(get("/_next/static/chunk.js"), Route::Cached(CacheTier::Static));
        assert_eq!(get("/api/auth/login"), Route::Uncacheable);
        assert_eq!(get("/api/tickets?status=open"), Route::Cached(CacheTier::Api));
        assert_eq!(get("/tickets/42"), Route::Cached(CacheTier::Dynamic));
        assert_eq!(get("/logo.png"), Route::Cached(CacheTier::Image));
    }

    #[test]
    fn test_deny_wins_over_allow() {
        // Both /api/tickets (allow) and /api/tickets/*/comments (deny) match
        assert_eq!(get("/api/tickets/42/comments"), Route::Uncacheable);
        assert_eq!(get("/api/tickets/create"), Route::Uncacheable);
        assert_eq!(get("/api/tickets/42"), Route::Cached(CacheTier::Api));
    }

    #[test]
    fn test_fonts() {
        let c = classifier();
        let google = Url::parse("https://fonts.gstatic.com/s/inter/v12/font.woff2").unwrap();
        assert_eq!(c.classify(HttpMethod::Get, &google), Route::Cached(CacheTier::Font));
        assert_eq!(get("/fonts/inter.woff2"), Route::Cached(CacheTier::Font));
    }

    #[test]
    fn test_non_get_and_cross_origin_bypass() {
        let c = classifier();
        let tickets = Url::parse("https://desk.example.com/api/tickets").unwrap();
        let foreign = Url::parse("https://cdn.other.com/app.js").unwrap();

        assert_eq!(c.classify(HttpMethod::Post, &tickets), Route::Uncacheable);
        assert_eq!(c.classify(HttpMethod::Head, &tickets), Route::Uncacheable);
        assert_eq!(c.classify(HttpMethod::Get, &foreign), Route::Uncacheable);
    }

    #[test]
    fn test_generic_fallthrough() {
        assert_eq!(get("/api/unknown"), Route::Generic);
        assert_eq!(get("/manifest.json"), Route::Generic);
    }

    #[test]
    fn test_root_is_dynamic_but_not_a_catch_all() {
        assert_eq!(get("/"), Route::Cached(CacheTier::Dynamic));
        assert_eq!(get("/reports/weekly"), Route::Generic);
    }

    #[test]
    fn test_accepts_api_response() {
        let c = classifier();
        let ok = Url::parse("https://desk.example.com/api/tickets").unwrap();
        let denied = Url::parse("https://desk.example.com/api/upload").unwrap();
        let page = Url::parse("https://desk.example.com/tickets").unwrap();

        assert!(c.accepts_api_response(&ok));
        assert!(!c.accepts_api_response(&denied));
        assert!(c.is_denied(&denied));
        assert!(!c.accepts_api_response(&page));
    }
}
