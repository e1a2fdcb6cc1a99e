//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the cache and sync crates:
//! - Configuration (`CoreConfig` builder with fail-fast validation)
//! - Broadcast channel (`EventBus` / `CoreEvent`)
//! - Process-lifetime performance counters
//! - Logging and tracing bootstrap

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;

pub use config::CoreConfig;
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
pub use metrics::{MetricsSnapshot, PerformanceMetrics};
