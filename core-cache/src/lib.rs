//! # Core Cache Module
//!
//! Tiered response cache for the offline worker.
//!
//! ## Overview
//!
//! - [`RequestClassifier`] maps a request to a [`CacheTier`] (or no tier)
//! - [`CacheStore`] keeps one store per tier on top of a host
//!   [`KeyedBlobStore`](bridge_traits::storage::KeyedBlobStore), with lazy
//!   expiry and FIFO eviction
//! - [`StrategyExecutor`] runs cache-first, network-first and
//!   stale-while-revalidate and synthesizes offline responses
//!
//! ## Usage
//!
//! ```ignore
//! use core_cache::StrategyExecutor;
//! use bridge_traits::http::HttpRequest;
//!
//! let executor = StrategyExecutor::new(&config, http, blobs, clock, events, metrics)?;
//! let served = executor.handle(HttpRequest::get("/api/tickets")).await;
//! ```

pub mod classifier;
pub mod entry;
pub mod error;
pub mod eviction;
pub mod offline;
pub mod pattern;
pub mod store;
pub mod strategy;
pub mod tier;

pub use classifier::{RequestClassifier, Route};
pub use entry::{request_key, CacheEntry, CACHED_AT_HEADER, CACHE_SOURCE_HEADER};
pub use error::{CacheError, Result};
pub use eviction::EvictionManager;
pub use offline::OfflineResponses;
pub use store::CacheStore;
pub use strategy::{PrecacheReport, ResponseSource, ServedResponse, StrategyExecutor};
pub use tier::{CacheTier, Strategy, TierPolicy, TierTable};
