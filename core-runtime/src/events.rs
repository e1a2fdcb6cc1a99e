//! # Event Bus System
//!
//! The broadcast channel between the core and every connected application
//! instance, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **CoreEvent**: the four live signals the core publishes
//! - **EventBus**: central broadcast channel for publishing events
//! - **EventStream**: wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌─────────────┐
//! │ Strategy Executor├────────>│           ├────────────>│ App window  │
//! └──────────────────┘         │ EventBus  │             └─────────────┘
//! ┌──────────────────┐  emit   │ (broadcast│  subscribe  ┌─────────────┐
//! │ Sync Coordinator ├────────>│  channel) ├────────────>│ App window  │
//! └──────────────────┘         └───────────┘             └─────────────┘
//! ```
//!
//! ## Delivery
//!
//! Delivery is best-effort and at-most-once per subscriber. Events emitted
//! before a subscriber joined are never replayed to it, and a subscriber that
//! falls more than the buffer size behind receives `RecvError::Lagged`.
//!
//! ## Wire format
//!
//! Events serialize with a `type` tag, e.g.
//! `{"type":"CACHE_UPDATE","url":"https://desk.example.com/api/tickets","source":"network"}`.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, UpdateSource};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::CacheUpdate {
//!     url: "https://desk.example.com/api/tickets".to_string(),
//!     source: UpdateSource::Network,
//! })
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Cache updated");
//! # }
//! ```

use bridge_traits::http::HttpMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};
use tracing::trace;

use crate::config::DEFAULT_EVENT_BUFFER_SIZE;
use crate::metrics::MetricsSnapshot;

// ============================================================================
// Event Types
// ============================================================================

/// Where a cached response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSource {
    /// Fresh response fetched and written through
    Network,
    /// Origin unreachable, cached copy served
    Cache,
}

/// A replayed offline action, as reported to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedAction {
    pub id: i64,
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoreEvent {
    /// A cache entry was refreshed from the network or served in its place
    CacheUpdate { url: String, source: UpdateSource },
    /// A queued offline action was acknowledged by the origin
    SyncSuccess { action: SyncedAction },
    /// New notifications fetched for the application
    NotificationsUpdate { notifications: serde_json::Value },
    /// Periodic counter report
    PerformanceMetrics {
        counters: MetricsSnapshot,
        timestamp: DateTime<Utc>,
    },
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::CacheUpdate { .. } => "Cache updated",
            CoreEvent::SyncSuccess { .. } => "Offline action synced",
            CoreEvent::NotificationsUpdate { .. } => "Notifications updated",
            CoreEvent::PerformanceMetrics { .. } => "Performance metrics",
        }
    }

    /// The wire name of the event kind
    pub fn kind(&self) -> &'static str {
        match self {
            CoreEvent::CacheUpdate { .. } => "CACHE_UPDATE",
            CoreEvent::SyncSuccess { .. } => "SYNC_SUCCESS",
            CoreEvent::NotificationsUpdate { .. } => "NOTIFICATIONS_UPDATE",
            CoreEvent::PerformanceMetrics { .. } => "PERFORMANCE_METRICS",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of events to buffer per subscriber.
    ///   When a subscriber falls behind by more than this amount, it will
    ///   receive a `RecvError::Lagged` error.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes an event, ignoring the absence of subscribers.
    pub fn broadcast(&self, event: CoreEvent) {
        let kind = event.kind();
        match self.sender.send(event) {
            Ok(receivers) => trace!(kind, receivers, "Broadcast event"),
            Err(_) => trace!(kind, "Broadcast event dropped, no subscribers"),
        }
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each call creates an independent stream that will receive all future events.
    /// Past events are not replayed.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.sender.subscribe())
    }

    /// Raw receiver for callers that want `tokio::sync::broadcast` semantics directly
    pub fn receiver(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with additional filtering capabilities.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let event_bus = EventBus::new(100);
/// let sync_only = event_bus
///     .subscribe()
///     .filter(|event| matches!(event, CoreEvent::SyncSuccess { .. }));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
