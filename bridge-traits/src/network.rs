//! Network Monitoring Abstraction
//!
//! Provides connectivity status so the core can replay queued work when the
//! host comes back online.

use async_trait::async_trait;

use crate::error::Result;

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub status: NetworkStatus,
    /// Whether the connection is metered (has data limits/costs)
    pub is_metered: bool,
}

impl NetworkInfo {
    pub fn connected() -> Self {
        Self {
            status: NetworkStatus::Connected,
            is_metered: false,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            status: NetworkStatus::Disconnected,
            is_metered: false,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == NetworkStatus::Connected
    }
}

/// Network monitor trait
///
/// The sync coordinator subscribes to changes and treats every transition
/// into [`NetworkStatus::Connected`] as a connectivity-restored signal.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::network::NetworkMonitor;
///
/// async fn wait_for_online(monitor: &dyn NetworkMonitor) -> Result<()> {
///     let mut changes = monitor.subscribe_changes().await?;
///     while let Some(info) = changes.next().await {
///         if info.is_online() {
///             break;
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get current network information
    async fn get_network_info(&self) -> Result<NetworkInfo>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(
            self.get_network_info().await,
            Ok(NetworkInfo {
                status: NetworkStatus::Connected,
                ..
            })
        )
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of network info updates. Implementations should
    /// emit an event whenever network status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next network info update
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkInfo>;
}
