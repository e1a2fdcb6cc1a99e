//! Cache entries and request keys

use bridge_traits::{http::HttpResponse, storage::StoredBlob};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Header naming where a response came from (`cache` or `offline`)
pub const CACHE_SOURCE_HEADER: &str = "x-cache-source";
/// Header carrying the original write time of a cached response
pub const CACHED_AT_HEADER: &str = "x-cached-at";

/// URL with the fragment dropped and query parameters sorted
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        pairs.sort();
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    url.to_string()
}

/// Store key for a cacheable request. Only GET is ever cached.
pub fn request_key(url: &Url) -> String {
    format!("GET {}", normalize_url(url))
}

/// A cached response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub request_key: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: bytes::Bytes,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn from_response(request_key: impl Into<String>, response: &HttpResponse, now: DateTime<Utc>) -> Self {
        Self {
            request_key: request_key.into(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: now,
        }
    }

    pub fn from_blob(request_key: impl Into<String>, blob: StoredBlob) -> Self {
        Self {
            request_key: request_key.into(),
            status: blob.status,
            headers: blob.headers,
            body: blob.body,
            stored_at: blob.stored_at,
        }
    }

    pub fn to_blob(&self) -> StoredBlob {
        StoredBlob {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            stored_at: self.stored_at,
        }
    }

    /// Expired iff `now - stored_at > max_age`. Entries from the future count as fresh.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.stored_at).to_std() {
            Ok(age) => age > max_age,
            Err(_) => false,
        }
    }

    /// The stored response, annotated as served from cache
    pub fn into_response(self) -> HttpResponse {
        let cached_at = self.stored_at.to_rfc3339();
        HttpResponse {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
        .with_header(CACHE_SOURCE_HEADER, "cache")
        .with_header(CACHED_AT_HEADER, cached_at)
    }
}
