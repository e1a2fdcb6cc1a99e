//! Responses synthesized when the origin is unreachable and nothing usable is cached.

use bridge_traits::http::HttpResponse;
use core_runtime::config::OfflineConfig;
use serde_json::{json, Map, Value};
use url::Url;

use crate::entry::CACHE_SOURCE_HEADER;
use crate::store::CacheStore;
use crate::tier::CacheTier;

const TRANSPARENT_PIXEL_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1" viewBox="0 0 1 1"><rect width="1" height="1" fill="none"/></svg>"#;

const OFFLINE_PAGE: &str = "<!DOCTYPE html>\
<html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>Offline</title></head>\
<body><main><h1>You are offline</h1>\
<p>Check your connection and try again. Pages you visited recently are still available.</p>\
</main></body></html>";

#[derive(Clone)]
pub struct OfflineResponses {
    config: OfflineConfig,
    document_url: Url,
    store: CacheStore,
}

impl OfflineResponses {
    pub fn new(origin: &Url, config: OfflineConfig, store: CacheStore) -> Self {
        let document_url = origin
            .join(&config.offline_document)
            .unwrap_or_else(|_| origin.clone());
        Self {
            config,
            document_url,
            store,
        }
    }

    pub fn document_url(&self) -> &Url {
        &self.document_url
    }

    /// JSON placeholder for an API request.
    ///
    /// List endpoints get an empty list so views render, identity endpoints
    /// report no user, everything else is a 503.
    pub fn api(&self, url: &Url) -> HttpResponse {
        let path = url.path().trim_end_matches('/');

        if let Some(endpoint) = self.config.list_endpoints.iter().find(|e| e.path == path) {
            let mut body = Map::new();
            body.insert(endpoint.entity.clone(), Value::Array(Vec::new()));
            body.insert("offline".to_string(), Value::Bool(true));
            body.insert("message".to_string(), Value::String(self.config.message.clone()));
            body.insert("cached".to_string(), Value::Bool(true));
            return offline(HttpResponse::json_value(200, &Value::Object(body)));
        }

        if self.config.identity_endpoints.iter().any(|p| p == path) {
            return offline(HttpResponse::json_value(
                200,
                &json!({ "user": null, "offline": true }),
            ));
        }

        offline(HttpResponse::json_value(
            503,
            &json!({
                "error": "Service unavailable",
                "message": self.config.message,
                "offline": true,
            }),
        ))
    }

    pub fn image_placeholder(&self) -> HttpResponse {
        offline(
            HttpResponse::new(200)
                .with_header("content-type", "image/svg+xml")
                .with_body(TRANSPARENT_PIXEL_SVG),
        )
    }

    /// The precached offline document, or a minimal inline page.
    pub async fn document(&self) -> HttpResponse {
        match self
            .store
            .lookup(CacheTier::OfflineFallback, &self.document_url)
            .await
        {
            Some(entry) => offline(entry.into_response()),
            None => offline(
                HttpResponse::new(503)
                    .with_header("content-type", "text/html; charset=utf-8")
                    .with_body(OFFLINE_PAGE),
            ),
        }
    }

    /// Fallback chosen by path shape: API JSON under `/api`, the document otherwise.
    pub async fn for_path(&self, url: &Url) -> HttpResponse {
        if is_api_path(url.path()) {
            self.api(url)
        } else {
            self.document().await
        }
    }
}

pub fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

fn offline(response: HttpResponse) -> HttpResponse {
    response.with_header(CACHE_SOURCE_HEADER, "offline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::SqliteBlobStore;
    use bridge_traits::time::ManualClock;
    use core_runtime::config::CacheLimits;
    use std::sync::Arc;

    use crate::tier::TierTable;

    async fn responses() -> (OfflineResponses, CacheStore) {
        let origin = Url::parse("https://desk.example.com").unwrap();
        let blobs = SqliteBlobStore::in_memory().await.unwrap();
        let store = CacheStore::new(
            Arc::new(blobs),
            TierTable::new("v1", &CacheLimits::default()),
            Arc::new(ManualClock::default()),
        );
        (
            OfflineResponses::new(&origin, OfflineConfig::default(), store.clone()),
            store,
        )
    }

    fn url(path: &str) -> Url {
        Url::parse("https://desk.example.com").unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_list_endpoint_placeholder() {
        let (offline, _) = responses().await;
        let response = offline.api(&url("/api/tickets"));

        assert_eq!(response.status, 200);
        assert_eq!(response.header(CACHE_SOURCE_HEADER), Some("offline"));
        let body: Value = response.json().unwrap();
        assert_eq!(body["tickets"], json!([]));
        assert_eq!(body["offline"], json!(true));
        assert_eq!(body["cached"], json!(true));

        let articles: Value = offline.api(&url("/api/knowledge-base")).json().unwrap();
        assert_eq!(articles["articles"], json!([]));
    }

    #[tokio::test]
    async fn test_identity_and_unknown_endpoints() {
        let (offline, _) = responses().await;

        let me = offline.api(&url("/api/auth/me"));
        assert_eq!(me.status, 200);
        assert_eq!(me.json::<Value>().unwrap(), json!({ "user": null, "offline": true }));

        let unknown = offline.api(&url("/api/unknown"));
        assert_eq!(unknown.status, 503);
        assert_eq!(unknown.json::<Value>().unwrap()["offline"], json!(true));
    }

    #[tokio::test]
    async fn test_document_prefers_precached_copy() {
        let (offline, store) = responses().await;

        let inline = offline.document().await;
        assert_eq!(inline.status, 503);
        assert!(inline.text().unwrap().contains("You are offline"));
        assert_eq!(inline.header(CACHE_SOURCE_HEADER), Some("offline"));

        let page = HttpResponse::new(200)
            .with_header("content-type", "text/html")
            .with_body("<h1>Offline shell</h1>");
        assert!(
            store
                .write(CacheTier::OfflineFallback, offline.document_url(), &page)
                .await
        );

        let cached = offline.document().await;
        assert_eq!(cached.status, 200);
        assert_eq!(cached.text().unwrap(), "<h1>Offline shell</h1>");
        assert_eq!(cached.header(CACHE_SOURCE_HEADER), Some("offline"));
    }

    #[test]
    fn test_is_api_path() {
        assert!(is_api_path("/api"));
        assert!(is_api_path("/api/tickets"));
        assert!(!is_api_path("/apiary"));
    }
}
