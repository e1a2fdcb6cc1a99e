//! # Offline Worker
//!
//! Single entry point for everything the host delivers: lifecycle events,
//! intercepted requests, connectivity signals, push messages, notification
//! clicks and application commands. Each [`WorkerEvent`] is an independent
//! task; the host may dispatch many concurrently.

use bridge_traits::{
    http::{HttpRequest, HttpResponse},
    notification::NotificationSpec,
};
use bytes::Bytes;
use chrono::Utc;
use core_cache::{
    PrecacheReport, ResponseSource, Route, ServedResponse, StrategyExecutor, CACHE_SOURCE_HEADER,
};
use core_runtime::{
    config::CoreConfig,
    events::{CoreEvent, EventBus},
    metrics::PerformanceMetrics,
};
use core_sync::{NewOfflineAction, OfflineQueue, ReplayReport, SyncCoordinator};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::commands::{into_action, Command, CommandReply};
use crate::error::Result;
use crate::notifications::{ClickOutcome, NotificationDispatcher};
use crate::CoreDependencies;

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// First start of this cache version: precache the shell
    Install,
    /// This version takes over: drop old stores, re-arm replay
    Activate,
    /// An intercepted request. With `capture_offline`, a mutating request that
    /// cannot reach the origin is queued instead of failing.
    Request {
        request: HttpRequest,
        capture_offline: bool,
    },
    ConnectivityRestored,
    PushReceived(Bytes),
    NotificationClicked {
        action: Option<String>,
        data: Value,
    },
    CommandMessage(Command),
}

#[derive(Debug, Clone)]
pub enum WorkerOutcome {
    Installed(PrecacheReport),
    Activated {
        deleted_stores: Vec<String>,
        replay_registered: bool,
    },
    Response(ServedResponse),
    Replayed(Option<ReplayReport>),
    NotificationShown(NotificationSpec),
    NotificationClicked(ClickOutcome),
    CommandReply(CommandReply),
}

#[derive(Clone)]
pub struct OfflineWorker {
    config: Arc<CoreConfig>,
    executor: StrategyExecutor,
    coordinator: SyncCoordinator,
    notifications: NotificationDispatcher,
    events: EventBus,
    metrics: Arc<PerformanceMetrics>,
}

impl OfflineWorker {
    /// Wire the core over host capabilities. The configuration is validated first.
    pub fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new(config.event_buffer_size);
        let metrics = Arc::new(PerformanceMetrics::init());

        let executor = StrategyExecutor::new(
            &config,
            deps.http_client.clone(),
            deps.blob_store,
            deps.clock.clone(),
            events.clone(),
            metrics.clone(),
        )?;

        let queue = OfflineQueue::new(deps.action_queue, deps.clock);
        let coordinator =
            SyncCoordinator::new(queue, deps.http_client, events.clone(), metrics.clone())
                .with_request_timeout(config.request_timeout);

        let notifications = NotificationDispatcher::new(
            deps.notification_host,
            config.notification_defaults.clone(),
            config.origin.clone(),
        );

        info!(origin = %config.origin, version = %config.cache_version, "Offline worker ready");

        Ok(Self {
            config: Arc::new(config),
            executor,
            coordinator,
            notifications,
            events,
            metrics,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn metrics(&self) -> &Arc<PerformanceMetrics> {
        &self.metrics
    }

    pub fn executor(&self) -> &StrategyExecutor {
        &self.executor
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    pub fn notifications(&self) -> &NotificationDispatcher {
        &self.notifications
    }

    #[instrument(skip(self, event))]
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<WorkerOutcome> {
        match event {
            WorkerEvent::Install => Ok(WorkerOutcome::Installed(self.install().await)),
            WorkerEvent::Activate => self.activate().await,
            WorkerEvent::Request {
                request,
                capture_offline,
            } => Ok(WorkerOutcome::Response(
                self.handle_request(request, capture_offline).await,
            )),
            WorkerEvent::ConnectivityRestored => Ok(WorkerOutcome::Replayed(
                self.coordinator.on_connectivity_restored().await,
            )),
            WorkerEvent::PushReceived(payload) => Ok(WorkerOutcome::NotificationShown(
                self.notifications.show(&payload).await?,
            )),
            WorkerEvent::NotificationClicked { action, data } => {
                Ok(WorkerOutcome::NotificationClicked(
                    self.notifications
                        .handle_click(action.as_deref(), &data)
                        .await?,
                ))
            }
            WorkerEvent::CommandMessage(command) => {
                Ok(WorkerOutcome::CommandReply(self.execute(command).await?))
            }
        }
    }

    pub async fn install(&self) -> PrecacheReport {
        let mut urls = self.config.precache_urls.clone();
        if !urls.contains(&self.config.offline.offline_document) {
            urls.push(self.config.offline.offline_document.clone());
        }
        self.executor.precache(&urls).await
    }

    async fn activate(&self) -> Result<WorkerOutcome> {
        let deleted_stores = self.executor.activate().await?;
        let replay_registered = self.coordinator.queue().restore_registration().await?;
        info!(
            deleted = deleted_stores.len(),
            replay_registered, "Activated"
        );
        Ok(WorkerOutcome::Activated {
            deleted_stores,
            replay_registered,
        })
    }

    /// Serve an intercepted request. Never fails.
    pub async fn handle_request(&self, request: HttpRequest, capture_offline: bool) -> ServedResponse {
        if capture_offline && !request.method.is_idempotent_read() {
            return self.capture(request).await;
        }
        self.executor.handle(request).await
    }

    async fn capture(&self, mut request: HttpRequest) -> ServedResponse {
        let url = match self.executor.resolve(&request.url) {
            Ok(url) => url,
            Err(_) => return self.executor.handle(request).await,
        };
        request.url = url.to_string();

        let error = match self.executor.fetch(request.clone()).await {
            Ok(response) => {
                return ServedResponse {
                    response,
                    source: ResponseSource::Network,
                    route: Route::Uncacheable,
                }
            }
            Err(e) => e,
        };
        debug!(url = %url, error = %error, "Origin unreachable, capturing action");

        let response = match NewOfflineAction::from_request(&request) {
            Ok(action) => match self.coordinator.queue().enqueue(action).await {
                Ok(queued) => HttpResponse::json_value(
                    202,
                    &json!({ "queued": true, "offline": true, "id": queued.id }),
                )
                .with_header(CACHE_SOURCE_HEADER, "offline"),
                Err(e) => {
                    warn!(url = %url, error = %e, "Could not queue offline action");
                    self.executor.offline().for_path(&url).await
                }
            },
            Err(e) => {
                warn!(url = %url, error = %e, "Request cannot be queued");
                self.executor.offline().for_path(&url).await
            }
        };

        ServedResponse {
            response,
            source: ResponseSource::Offline,
            route: Route::Uncacheable,
        }
    }

    #[instrument(skip(self, command), fields(command = command.name()))]
    pub async fn execute(&self, command: Command) -> Result<CommandReply> {
        match command {
            Command::QueueOfflineAction {
                url,
                method,
                headers,
                body,
            } => {
                let url = self.executor.resolve(&url)?.to_string();
                let action = self
                    .coordinator
                    .queue()
                    .enqueue(into_action(url, method, headers, body))
                    .await?;
                Ok(CommandReply::ActionQueued { id: action.id })
            }
            Command::CacheApiResponse { url, response } => {
                let stored = self
                    .executor
                    .cache_api_response(&url, &response.into_response())
                    .await?;
                Ok(CommandReply::ResponseCached { stored })
            }
            Command::GetMetrics => {
                let counters = self.metrics.snapshot();
                let timestamp = Utc::now();
                self.events.broadcast(CoreEvent::PerformanceMetrics {
                    counters,
                    timestamp,
                });
                Ok(CommandReply::Metrics {
                    counters,
                    timestamp,
                })
            }
            Command::ClearCache => Ok(CommandReply::CacheCleared {
                removed: self.executor.clear_all().await?,
            }),
            Command::PurgeQueue => Ok(CommandReply::QueuePurged {
                removed: self.coordinator.queue().purge().await?,
            }),
            Command::ReplayNow => Ok(CommandReply::ReplayFinished {
                report: self.coordinator.replay_all().await?,
            }),
        }
    }
}
