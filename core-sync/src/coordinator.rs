//! # Sync Coordinator
//!
//! Replays queued offline actions against the origin.
//!
//! ## Workflow
//!
//! 1. The host signals restored connectivity (or a manual replay is requested)
//! 2. Every queued action is read in id order
//! 3. Each action is sent once with its captured method, headers and body
//! 4. A 2xx removes the action and broadcasts `SYNC_SUCCESS`
//! 5. Anything else leaves the action queued for the next signal
//!
//! Failures never stop the pass, so a later action can succeed while an
//! earlier one stays queued: replay is best-effort ordered, not ordered
//! delivery. Passes are serialized, a signal arriving mid-pass waits for it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::SyncCoordinator;
//!
//! let coordinator = SyncCoordinator::new(queue, http, event_bus, metrics);
//! let watch = coordinator.spawn_connectivity_watch(network_monitor);
//!
//! let report = coordinator.replay_all().await?;
//! println!("{} replayed, {} still queued", report.succeeded.len(), report.failed.len());
//! ```

use bridge_traits::{
    http::HttpClient,
    network::NetworkMonitor,
};
use core_runtime::{
    events::{CoreEvent, EventBus, SyncedAction},
    logging::redact_headers,
    metrics::PerformanceMetrics,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::{action::OfflineAction, queue::OfflineQueue, Result};

/// Why an action stayed queued
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FailureReason {
    /// The origin answered with a non-2xx status
    Rejected { status: u16 },
    /// The origin could not be reached
    Transport { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFailure {
    pub id: i64,
    pub reason: FailureReason,
}

/// Outcome of one replay pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub succeeded: Vec<i64>,
    pub failed: Vec<ReplayFailure>,
}

impl ReplayReport {
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct SyncCoordinator {
    queue: OfflineQueue,
    http: Arc<dyn HttpClient>,
    event_bus: EventBus,
    metrics: Arc<PerformanceMetrics>,
    request_timeout: Option<Duration>,
    replay_lock: Arc<Mutex<()>>,
}

impl SyncCoordinator {
    pub fn new(
        queue: OfflineQueue,
        http: Arc<dyn HttpClient>,
        event_bus: EventBus,
        metrics: Arc<PerformanceMetrics>,
    ) -> Self {
        Self {
            queue,
            http,
            event_bus,
            metrics,
            request_timeout: None,
            replay_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Timeout applied to every replayed request
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Attempt every queued action once.
    ///
    /// An empty queue is a no-op: no requests, no events, no counter change.
    #[instrument(skip(self))]
    pub async fn replay_all(&self) -> Result<ReplayReport> {
        let _guard = self.replay_lock.lock().await;

        // Cleared before the read so an enqueue during the pass registers again.
        self.queue.take_registration();

        let actions = match self.queue.pending().await {
            Ok(actions) => actions,
            Err(e) => {
                self.queue.register_replay();
                return Err(e);
            }
        };
        if actions.is_empty() {
            debug!("Offline queue empty, nothing to replay");
            return Ok(ReplayReport::default());
        }

        self.metrics.record_background_sync();
        info!(count = actions.len(), "Replaying offline actions");

        let mut report = ReplayReport::default();
        for action in actions {
            match self.replay_one(&action).await {
                Ok(()) => report.succeeded.push(action.id),
                Err(reason) => report.failed.push(ReplayFailure {
                    id: action.id,
                    reason,
                }),
            }
        }

        match self.queue.is_empty().await {
            Ok(true) => debug!("Queue drained, connectivity replay no longer registered"),
            Ok(false) => self.queue.register_replay(),
            Err(e) => {
                warn!(error = %e, "Could not check queue after replay, keeping registration");
                self.queue.register_replay();
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Replay pass finished"
        );
        Ok(report)
    }

    async fn replay_one(&self, action: &OfflineAction) -> std::result::Result<(), FailureReason> {
        debug!(
            action_id = action.id,
            method = %action.method,
            url = %action.url,
            headers = ?redact_headers(&action.headers),
            "Replaying offline action"
        );

        let mut request = action.to_request();
        request.timeout = self.request_timeout;

        match self.http.execute(request).await {
            Ok(response) if response.is_success() => {
                match self.queue.remove(action.id).await {
                    Ok(true) => {}
                    Ok(false) => warn!(action_id = action.id, "Replayed action already removed"),
                    Err(e) => {
                        error!(action_id = action.id, error = %e, "Replayed action could not be removed, it will be sent again")
                    }
                }
                self.event_bus.broadcast(CoreEvent::SyncSuccess {
                    action: SyncedAction::from(action),
                });
                info!(action_id = action.id, status = response.status, "Offline action synced");
                Ok(())
            }
            Ok(response) => {
                warn!(action_id = action.id, status = response.status, "Origin rejected offline action, keeping it queued");
                Err(FailureReason::Rejected {
                    status: response.status,
                })
            }
            Err(e) => {
                warn!(action_id = action.id, error = %e, "Offline action replay failed, keeping it queued");
                Err(FailureReason::Transport {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Handle the connectivity-restored signal.
    ///
    /// Replays only while registered, i.e. after an enqueue or a restart
    /// with surviving actions.
    pub async fn on_connectivity_restored(&self) -> Option<ReplayReport> {
        if !self.queue.is_replay_registered() {
            debug!("Connectivity restored, no replay registered");
            return None;
        }

        match self.replay_all().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!(error = %e, "Replay pass failed");
                None
            }
        }
    }

    /// Turn a monitor's change stream into connectivity-restored signals.
    ///
    /// Only transitions into the connected state fire; the first observation
    /// counts as a transition when it is connected.
    pub fn spawn_connectivity_watch(&self, monitor: Arc<dyn NetworkMonitor>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            let mut changes = match monitor.subscribe_changes().await {
                Ok(changes) => changes,
                Err(e) => {
                    error!(error = %e, "Failed to subscribe to network changes");
                    return;
                }
            };

            let mut was_online = false;
            while let Some(info) = changes.next().await {
                let online = info.is_online();
                if online && !was_online {
                    info!("Connectivity restored");
                    coordinator.on_connectivity_restored().await;
                }
                was_online = online;
            }
            debug!("Network change stream ended");
        })
    }
}
