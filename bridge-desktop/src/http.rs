//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reqwest-based HTTP client implementation
///
/// Makes exactly one attempt per request. Retrying is the caller's business:
/// reads fall back to cache and writes go through the offline queue.
///
/// No overall request timeout is applied unless one is configured, either
/// per client (`with_timeout`) or per request (`HttpRequest::timeout`).
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::build(None)
    }

    /// Create a new HTTP client that aborts requests after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::build(Some(timeout))
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .user_agent(concat!("offline-worker/", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self { client })
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = request.body {
            req = req.body(body);
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Split reqwest failures into transport failures and everything else
    fn map_error(e: reqwest::Error) -> BridgeError {
        if e.is_timeout() {
            BridgeError::Network(format!("Request timed out: {}", e))
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            BridgeError::Network(e.to_string())
        } else {
            BridgeError::OperationFailed(e.to_string())
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let url = request.url.clone();
        debug!(method = %method, url = %url, "Executing HTTP request");

        let response = self
            .build_request(request)
            .send()
            .await
            .map_err(|e| {
                warn!(method = %method, url = %url, error = %e, "HTTP request failed");
                Self::map_error(e)
            })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = response.bytes().await.map_err(Self::map_error)?;

        debug!(method = %method, url = %url, status, "HTTP response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        assert!(ReqwestHttpClient::new().is_ok());
        assert!(ReqwestHttpClient::with_timeout(Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Get),
            reqwest::Method::GET
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Options),
            reqwest::Method::OPTIONS
        );
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_network_error() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        // Port 9 on loopback (discard) is closed on test hosts.
        let err = client
            .execute(HttpRequest::get("http://127.0.0.1:9/api/tickets"))
            .await
            .unwrap_err();

        assert!(err.is_network(), "unexpected error: {err}");
    }
}
