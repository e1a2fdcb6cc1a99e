//! Command interface
//!
//! Messages the application posts to the worker, and the replies it gets back.
//!
//! ```json
//! {"type":"QUEUE_OFFLINE_ACTION","url":"/api/tickets","method":"POST","body":"{...}"}
//! {"type":"CACHE_API_RESPONSE","url":"/api/users","response":{"status":200,"body":{"users":[]}}}
//! {"type":"GET_METRICS"}
//! ```

use bridge_traits::http::{HttpMethod, HttpResponse};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_runtime::metrics::MetricsSnapshot;
use core_sync::{NewOfflineAction, ReplayReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Durably queue a mutating request for replay
    QueueOfflineAction {
        url: String,
        method: HttpMethod,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<String>,
    },
    /// Store a response the application already fetched
    CacheApiResponse { url: String, response: ResponsePayload },
    GetMetrics,
    /// Empty every cache store
    ClearCache,
    /// Drop every queued offline action without replaying it
    PurgeQueue,
    /// Replay the offline queue now
    ReplayNow,
}

impl Command {
    pub fn parse(message: &str) -> Result<Self> {
        serde_json::from_str(message).map_err(|e| CoreError::InvalidCommand(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::QueueOfflineAction { .. } => "QUEUE_OFFLINE_ACTION",
            Command::CacheApiResponse { .. } => "CACHE_API_RESPONSE",
            Command::GetMetrics => "GET_METRICS",
            Command::ClearCache => "CLEAR_CACHE",
            Command::PurgeQueue => "PURGE_QUEUE",
            Command::ReplayNow => "REPLAY_NOW",
        }
    }
}

/// A response as the application describes it.
///
/// A string `body` is stored as-is; any other JSON value is stored serialized
/// with a JSON content type unless one is given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponsePayload {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

fn default_status() -> u16 {
    200
}

impl ResponsePayload {
    pub fn into_response(self) -> HttpResponse {
        let mut response = HttpResponse::new(self.status);
        response.headers = self.headers;

        match self.body {
            Value::Null => response,
            Value::String(text) => response.with_body(Bytes::from(text)),
            json => {
                if response.header("content-type").is_none() {
                    response = response.with_header("content-type", "application/json");
                }
                response.with_body(Bytes::from(json.to_string()))
            }
        }
    }
}

pub(crate) fn into_action(
    url: String,
    method: HttpMethod,
    headers: HashMap<String, String>,
    body: Option<String>,
) -> NewOfflineAction {
    NewOfflineAction {
        url,
        method,
        headers,
        body,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandReply {
    ActionQueued { id: i64 },
    ResponseCached { stored: bool },
    Metrics {
        counters: MetricsSnapshot,
        timestamp: DateTime<Utc>,
    },
    CacheCleared { removed: u64 },
    QueuePurged { removed: u64 },
    ReplayFinished { report: ReplayReport },
}
