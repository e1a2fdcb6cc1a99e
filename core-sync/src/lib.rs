//! # Offline Sync Module
//!
//! Durable capture and replay of mutating requests made while offline.
//!
//! ## Components
//!
//! - **Offline Action** (`action`): a captured request and its queue id
//! - **Offline Queue** (`queue`): durable FIFO over the host's `DurableOrderedQueue`
//! - **Sync Coordinator** (`coordinator`): replays the queue when connectivity returns

pub mod action;
pub mod coordinator;
pub mod error;
pub mod queue;

pub use action::{NewOfflineAction, OfflineAction};
pub use coordinator::{FailureReason, ReplayFailure, ReplayReport, SyncCoordinator};
pub use error::{Result, SyncError};
pub use queue::OfflineQueue;
