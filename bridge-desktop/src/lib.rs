//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `KeyedBlobStore` and `DurableOrderedQueue` using SQLite via `sqlx`
//! - `NetworkMonitor` using a Tokio TCP probe
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{connect_sqlite, ReqwestHttpClient, SqliteActionQueue, SqliteBlobStore};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let pool = connect_sqlite("data/offline.db".as_ref()).await?;
//!     let blobs = SqliteBlobStore::new(pool.clone()).await?;
//!     let queue = SqliteActionQueue::new(pool).await?;
//!     let http = ReqwestHttpClient::new()?;
//!     // Hand to core-service bootstrap
//!     Ok(())
//! }
//! ```

mod blob_store;
mod db;
mod http;
mod network;
mod queue;

pub use blob_store::SqliteBlobStore;
pub use db::{connect_in_memory, connect_sqlite};
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use queue::SqliteActionQueue;
