//! Offline actions
//!
//! A mutating request the application could not deliver, held in the durable
//! queue until the origin acknowledges it with a 2xx.

use bridge_traits::{
    http::{HttpMethod, HttpRequest},
    storage::QueuedRecord,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::{events::SyncedAction, logging::redact_headers};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, SyncError};

/// An action as submitted by the application, before it has an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOfflineAction {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl NewOfflineAction {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Build from an intercepted request. Non-UTF-8 bodies cannot be queued.
    pub fn from_request(request: &HttpRequest) -> Result<Self> {
        let body = match &request.body {
            Some(bytes) => Some(String::from_utf8(bytes.to_vec()).map_err(|_| {
                SyncError::InvalidAction {
                    field: "body".to_string(),
                    message: "request body is not valid UTF-8".to_string(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            url: request.url.clone(),
            method: request.method,
            headers: request.headers.clone(),
            body,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(SyncError::InvalidAction {
                field: "url".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        }

        if self.method.is_idempotent_read() {
            return Err(SyncError::InvalidAction {
                field: "method".to_string(),
                message: format!("{} requests are served from cache, not queued", self.method),
            });
        }

        Ok(())
    }

    pub(crate) fn to_payload(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// A queued action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineAction {
    /// Queue-assigned id, monotonically increasing
    pub id: i64,
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl OfflineAction {
    pub(crate) fn from_record(record: &QueuedRecord) -> Result<Self> {
        let action: NewOfflineAction = serde_json::from_slice(&record.payload)?;
        Ok(Self::assemble(record.id, action, record.enqueued_at))
    }

    pub(crate) fn assemble(id: i64, action: NewOfflineAction, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id,
            url: action.url,
            method: action.method,
            headers: action.headers,
            body: action.body,
            enqueued_at,
        }
    }

    /// The request to replay, exactly as captured
    pub fn to_request(&self) -> HttpRequest {
        let request =
            HttpRequest::new(self.method, self.url.clone()).headers(self.headers.clone());
        match &self.body {
            Some(body) => request.body(Bytes::from(body.clone())),
            None => request,
        }
    }
}

impl From<&OfflineAction> for SyncedAction {
    fn from(action: &OfflineAction) -> Self {
        SyncedAction {
            id: action.id,
            url: action.url.clone(),
            method: action.method,
            headers: redact_headers(&action.headers),
            body: action.body.clone(),
            enqueued_at: action.enqueued_at,
        }
    }
}
