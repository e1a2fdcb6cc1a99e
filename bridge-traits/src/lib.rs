//! # Host Bridge Traits
//!
//! Host capability traits consumed by the offline cache-and-sync core.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and the host it runs in.
//! Each trait is a capability the core requires but that is implemented
//! differently per host (desktop process, embedded webview, browser worker).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-attempt fetch against the origin
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity changes
//!
//! ### Persistence
//! - [`KeyedBlobStore`](storage::KeyedBlobStore) - Namespaced response storage, one namespace per cache tier
//! - [`DurableOrderedQueue`](storage::DurableOrderedQueue) - Crash-safe FIFO for deferred writes
//!
//! ### Host Integration
//! - [`NotificationHost`](notification::NotificationHost) - Notification surface and window focus/navigation
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Host Implementations
//!
//! | Host     | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. The
//! distinction that matters most to the core is transport failure
//! ([`BridgeError::Network`]) versus everything else: only the former
//! triggers cache fallback and offline queuing.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod http;
pub mod network;
pub mod notification;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus};
pub use notification::{ClientWindow, NotificationAction, NotificationHost, NotificationSpec};
pub use storage::{DurableOrderedQueue, KeyedBlobStore, QueuedRecord, StoredBlob};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
