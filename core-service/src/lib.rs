//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, blob store,
//! action queue, notifications, clock) into the offline worker. Desktop hosts
//! enable the `desktop-shims` feature (which depends on `bridge-desktop`) and
//! call [`bootstrap_desktop`]; other hosts build a [`CoreDependencies`] from
//! their own adapters and call [`OfflineWorker::new`].

pub mod commands;
pub mod error;
pub mod notifications;
pub mod tasks;
pub mod worker;

pub use commands::{Command, CommandReply, ResponsePayload};
pub use error::{CoreError, Result};
pub use notifications::{ClickOutcome, NotificationDispatcher, PushPayload};
pub use worker::{OfflineWorker, WorkerEvent, WorkerOutcome};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    network::NetworkMonitor,
    notification::NotificationHost,
    storage::{DurableOrderedQueue, KeyedBlobStore},
    time::{Clock, SystemClock},
};
use tokio::task::JoinHandle;
use tracing::info;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub blob_store: Arc<dyn KeyedBlobStore>,
    pub action_queue: Arc<dyn DurableOrderedQueue>,
    pub notification_host: Arc<dyn NotificationHost>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles, on the system clock.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        blob_store: Arc<dyn KeyedBlobStore>,
        action_queue: Arc<dyn DurableOrderedQueue>,
        notification_host: Arc<dyn NotificationHost>,
    ) -> Self {
        Self {
            http_client,
            blob_store,
            action_queue,
            notification_host,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Background tasks started by [`OfflineWorker::start_background_tasks`].
///
/// Dropping the handle leaves the tasks running; call [`shutdown`](Self::shutdown) to stop them.
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

impl OfflineWorker {
    /// Start the connectivity watch (when a monitor is given), the metrics
    /// reporter and the notification poller, as configured.
    pub fn start_background_tasks(&self, monitor: Option<Arc<dyn NetworkMonitor>>) -> BackgroundTasks {
        let mut handles = Vec::new();

        if let Some(monitor) = monitor {
            handles.push(self.coordinator().spawn_connectivity_watch(monitor));
        }

        if let Some(period) = self.config().metrics_interval {
            handles.push(tasks::spawn_metrics_reporter(
                self.events().clone(),
                self.metrics().clone(),
                period,
            ));
        }

        if let Some(poll) = &self.config().notification_poll {
            handles.push(tasks::spawn_notification_poller(
                self.executor().clone(),
                self.events().clone(),
                poll.url.clone(),
                poll.interval,
            ));
        }

        info!(tasks = handles.len(), "Background tasks started");
        BackgroundTasks { handles }
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Opens (or creates) the SQLite database from the configuration, or an
/// in-memory one when no path is set, and uses reqwest for the origin.
///
/// ```no_run
/// # #[cfg(feature = "desktop-shims")]
/// # async fn example(host: std::sync::Arc<dyn bridge_traits::NotificationHost>) -> core_service::Result<()> {
/// use core_runtime::CoreConfig;
/// use core_service::{bootstrap_desktop, WorkerEvent};
///
/// let config = CoreConfig::builder()
///     .origin("https://desk.example.com")
///     .database_path("/var/lib/desk/offline.db")
///     .build()?;
/// let worker = bootstrap_desktop(config, host).await?;
/// worker.dispatch(WorkerEvent::Install).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    config: core_runtime::CoreConfig,
    notification_host: Arc<dyn NotificationHost>,
) -> Result<OfflineWorker> {
    use bridge_desktop::{
        connect_in_memory, connect_sqlite, ReqwestHttpClient, SqliteActionQueue, SqliteBlobStore,
    };

    let init = |err: bridge_traits::error::BridgeError| CoreError::InitializationFailed(err.to_string());

    let pool = match &config.database_path {
        Some(path) => connect_sqlite(path).await.map_err(init)?,
        None => connect_in_memory().await.map_err(init)?,
    };
    let blob_store = SqliteBlobStore::new(pool.clone()).await.map_err(init)?;
    let action_queue = SqliteActionQueue::new(pool).await.map_err(init)?;
    let http_client = ReqwestHttpClient::new().map_err(init)?;

    let deps = CoreDependencies::new(
        Arc::new(http_client),
        Arc::new(blob_store),
        Arc::new(action_queue),
        notification_host,
    );
    OfflineWorker::new(config, deps)
}

/// Connectivity monitor that probes the configured origin over TCP, for
/// [`OfflineWorker::start_background_tasks`].
#[cfg(feature = "desktop-shims")]
pub fn desktop_network_monitor(config: &core_runtime::CoreConfig) -> Result<Arc<dyn NetworkMonitor>> {
    let origin = &config.origin;
    let (Some(host), Some(port)) = (origin.host_str(), origin.port_or_known_default()) else {
        return Err(CoreError::InitializationFailed(format!(
            "Origin {} has no host to probe",
            origin
        )));
    };

    Ok(Arc::new(bridge_desktop::DesktopNetworkMonitor::with_probe(
        format!("{}:{}", host, port),
    )))
}

#[cfg(all(test, feature = "desktop-shims"))]
mod tests {
    use super::*;
    use bridge_traits::notification::{ClientWindow, NotificationSpec};
    use core_runtime::CoreConfig;
    use std::time::Duration;

    struct NoWindows;

    #[async_trait::async_trait]
    impl NotificationHost for NoWindows {
        async fn show_notification(&self, _spec: NotificationSpec) -> bridge_traits::error::Result<()> {
            Ok(())
        }

        async fn list_windows(&self) -> bridge_traits::error::Result<Vec<ClientWindow>> {
            Ok(Vec::new())
        }

        async fn focus_window(&self, _id: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }

        async fn navigate_window(&self, _id: &str, _url: &str) -> bridge_traits::error::Result<()> {
            Ok(())
        }

        async fn open_window(&self, url: &str) -> bridge_traits::error::Result<ClientWindow> {
            Ok(ClientWindow {
                id: "1".to_string(),
                url: url.to_string(),
                focused: true,
            })
        }
    }

    fn config() -> CoreConfig {
        CoreConfig::builder()
            .origin("https://desk.example.com")
            .in_memory_storage()
            .metrics_interval(Some(Duration::from_secs(60)))
            .notification_poll("/api/notifications", Duration::from_secs(30))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_bootstrap_desktop_in_memory() {
        let worker = bootstrap_desktop(config(), Arc::new(NoWindows)).await.unwrap();

        assert!(worker.coordinator().queue().is_empty().await.unwrap());
        assert_eq!(worker.config().cache_version, "v1");

        let tasks = worker.start_background_tasks(None);
        assert_eq!(tasks.len(), 2);
        tasks.shutdown();
    }

    #[tokio::test]
    async fn test_background_tasks_include_connectivity_watch() {
        let config = config();
        let monitor = desktop_network_monitor(&config).unwrap();
        let worker = bootstrap_desktop(config, Arc::new(NoWindows)).await.unwrap();

        let tasks = worker.start_background_tasks(Some(monitor));
        assert_eq!(tasks.len(), 3);
        tasks.shutdown();
    }
}
