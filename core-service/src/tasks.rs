//! Periodic background tasks

use bridge_traits::http::HttpRequest;
use chrono::Utc;
use core_cache::{ResponseSource, StrategyExecutor};
use core_runtime::{
    events::{CoreEvent, EventBus},
    metrics::PerformanceMetrics,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Broadcast `PERFORMANCE_METRICS` every `period`, first report one period in.
pub fn spawn_metrics_reporter(
    events: EventBus,
    metrics: Arc<PerformanceMetrics>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let counters = metrics.snapshot();
            trace!(?counters, "Reporting metrics");
            events.broadcast(CoreEvent::PerformanceMetrics {
                counters,
                timestamp: Utc::now(),
            });
        }
    })
}

/// Fetch `url` through the cache strategies every `period` and broadcast
/// `NOTIFICATIONS_UPDATE` when the body carries a `notifications` field.
///
/// Offline placeholders are not broadcast, they would blank the list.
pub fn spawn_notification_poller(
    executor: StrategyExecutor,
    events: EventBus,
    url: String,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            poll_notifications(&executor, &events, &url).await;
        }
    })
}

pub(crate) async fn poll_notifications(executor: &StrategyExecutor, events: &EventBus, url: &str) -> bool {
    let served = executor.handle(HttpRequest::get(url)).await;

    if served.source == ResponseSource::Offline || !served.response.is_success() {
        debug!(url, status = served.response.status, "Notification poll skipped");
        return false;
    }

    let notifications = match served.response.json::<Value>() {
        Ok(mut body) => match body.get_mut("notifications") {
            Some(value) => value.take(),
            None => {
                debug!(url, "Notification poll body has no notifications field");
                return false;
            }
        },
        Err(e) => {
            debug!(url, error = %e, "Notification poll body is not JSON");
            return false;
        }
    };

    events.broadcast(CoreEvent::NotificationsUpdate { notifications });
    true
}
