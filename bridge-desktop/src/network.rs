//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus},
};
use std::time::Duration;
use tracing::debug;

const DEFAULT_PROBE_ADDR: &str = "8.8.8.8:53";
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Desktop network monitor implementation
///
/// Connectivity is a TCP connect to a probe address. Point the probe at the
/// origin host to track origin reachability instead of general internet access.
#[derive(Debug, Clone)]
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    /// Create a new network monitor
    pub fn new() -> Self {
        Self::with_probe(DEFAULT_PROBE_ADDR)
    }

    /// Probe a specific `host:port` instead of the default
    pub fn with_probe(probe_addr: impl Into<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn check_connectivity(&self) -> NetworkStatus {
        match tokio::time::timeout(
            PROBE_TIMEOUT,
            tokio::net::TcpStream::connect(self.probe_addr.as_str()),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) => NetworkStatus::Disconnected,
            Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn get_network_info(&self) -> Result<NetworkInfo> {
        let status = self.check_connectivity().await;
        debug!(status = ?status, probe = %self.probe_addr, "Network info updated");

        Ok(NetworkInfo {
            status,
            // Desktop connections are typically not metered
            is_metered: false,
        })
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(DesktopNetworkChangeStream {
            monitor: self.clone(),
            last_status: None,
        }))
    }
}

/// Network change stream that polls for changes
struct DesktopNetworkChangeStream {
    monitor: DesktopNetworkMonitor,
    last_status: Option<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for DesktopNetworkChangeStream {
    async fn next(&mut self) -> Option<NetworkInfo> {
        loop {
            if self.last_status.is_some() {
                tokio::time::sleep(self.monitor.poll_interval).await;
            }

            if let Ok(info) = self.monitor.get_network_info().await {
                // Only return if status changed
                if self.last_status.as_ref() != Some(&info.status) {
                    self.last_status = Some(info.status);
                    return Some(info);
                }
            }
        }
    }
}
