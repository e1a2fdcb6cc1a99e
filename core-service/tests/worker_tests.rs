//! End-to-end tests for the offline worker over SQLite adapters
//!
//! These tests verify:
//! - Install precaches the shell and the offline document
//! - Activate drops stores from older cache versions
//! - Captured writes are queued while offline and replayed on reconnect
//! - Every command message produces its reply
//! - Push messages and notification clicks reach the host

use async_trait::async_trait;
use bridge_desktop::{SqliteActionQueue, SqliteBlobStore};
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
    notification::{ClientWindow, NotificationHost, NotificationSpec},
    storage::{KeyedBlobStore, StoredBlob},
};
use bytes::Bytes;
use chrono::Utc;
use core_runtime::{
    config::CoreConfig,
    events::{CoreEvent, UpdateSource},
};
use core_cache::{CacheError, ResponseSource, CACHE_SOURCE_HEADER};
use core_service::{
    ClickOutcome, Command, CommandReply, CoreDependencies, CoreError, OfflineWorker, WorkerEvent,
    WorkerOutcome,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const ORIGIN: &str = "https://desk.example.com";

// ============================================================================
// Fakes
// ============================================================================

/// Origin keyed by `METHOD url`, falling back to the URL alone
#[derive(Default)]
struct FakeOrigin {
    routes: Mutex<HashMap<String, HttpResponse>>,
    offline: Mutex<bool>,
    requests: Mutex<Vec<(HttpMethod, String)>>,
}

impl FakeOrigin {
    fn serve(&self, path: &str, response: HttpResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("{}{}", ORIGIN, path), response);
    }

    fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    fn requests(&self) -> Vec<(HttpMethod, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for FakeOrigin {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests
            .lock()
            .unwrap()
            .push((request.method, request.url.clone()));

        if *self.offline.lock().unwrap() {
            return Err(BridgeError::Network("origin unreachable".to_string()));
        }

        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| HttpResponse::new(404)))
    }
}

/// Host with a fixed set of windows that records what the core asks of it
#[derive(Default)]
struct FakeHost {
    windows: Mutex<Vec<ClientWindow>>,
    shown: Mutex<Vec<NotificationSpec>>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationHost for FakeHost {
    async fn show_notification(&self, spec: NotificationSpec) -> BridgeResult<()> {
        self.shown.lock().unwrap().push(spec);
        Ok(())
    }

    async fn list_windows(&self) -> BridgeResult<Vec<ClientWindow>> {
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn focus_window(&self, id: &str) -> BridgeResult<()> {
        self.focused.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn navigate_window(&self, _id: &str, _url: &str) -> BridgeResult<()> {
        Ok(())
    }

    async fn open_window(&self, url: &str) -> BridgeResult<ClientWindow> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(ClientWindow {
            id: "opened".to_string(),
            url: url.to_string(),
            focused: true,
        })
    }
}

struct Setup {
    worker: OfflineWorker,
    origin: Arc<FakeOrigin>,
    host: Arc<FakeHost>,
    blobs: Arc<SqliteBlobStore>,
}

async fn setup() -> Setup {
    let config = CoreConfig::builder()
        .origin(ORIGIN)
        .in_memory_storage()
        .precache_urls(["/", "/_next/static/app.js"])
        .metrics_interval(None)
        .build()
        .unwrap();

    let origin = Arc::new(FakeOrigin::default());
    origin.serve("/", HttpResponse::new(200).with_body("<html>home</html>"));
    origin.serve(
        "/_next/static/app.js",
        HttpResponse::new(200).with_body("console.log('app')"),
    );
    origin.serve(
        "/offline",
        HttpResponse::new(200)
            .with_header("content-type", "text/html")
            .with_body("<html>offline shell</html>"),
    );

    let host = Arc::new(FakeHost::default());
    let blobs = Arc::new(SqliteBlobStore::in_memory().await.unwrap());
    let queue = Arc::new(SqliteActionQueue::in_memory().await.unwrap());

    let deps = CoreDependencies::new(origin.clone(), blobs.clone(), queue, host.clone());
    let worker = OfflineWorker::new(config, deps).unwrap();

    Setup {
        worker,
        origin,
        host,
        blobs,
    }
}

fn request(method: HttpMethod, path: &str) -> WorkerEvent {
    WorkerEvent::Request {
        request: HttpRequest::new(method, path),
        capture_offline: true,
    }
}

fn served(outcome: WorkerOutcome) -> core_cache::ServedResponse {
    match outcome {
        WorkerOutcome::Response(served) => served,
        other => panic!("expected a response, got {:?}", other),
    }
}

fn reply(outcome: WorkerOutcome) -> CommandReply {
    match outcome {
        WorkerOutcome::CommandReply(reply) => reply,
        other => panic!("expected a command reply, got {:?}", other),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_install_precaches_shell_and_offline_document() {
    let Setup { worker, origin, .. } = setup().await;

    let report = match worker.dispatch(WorkerEvent::Install).await.unwrap() {
        WorkerOutcome::Installed(report) => report,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(report.stored.len(), 3);
    assert!(report.failed.is_empty());

    // Navigation to an unknown page while offline falls back to the precached document
    origin.set_offline(true);
    let served = served(
        worker
            .dispatch(WorkerEvent::Request {
                request: HttpRequest::get("/reports").header("Accept", "text/html"),
                capture_offline: false,
            })
            .await
            .unwrap(),
    );
    assert_eq!(served.source, ResponseSource::Offline);
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.body, "<html>offline shell</html>");
}

#[tokio::test]
async fn test_precache_failures_are_reported_not_fatal() {
    let Setup { worker, origin, .. } = setup().await;
    origin.serve("/_next/static/app.js", HttpResponse::new(500));

    let report = worker.install().await;
    assert_eq!(report.stored.len(), 2);
    assert_eq!(report.failed, vec![format!("{}/_next/static/app.js", ORIGIN)]);
}

#[tokio::test]
async fn test_activate_drops_previous_version_stores() {
    let Setup { worker, blobs, .. } = setup().await;

    let old = StoredBlob {
        status: 200,
        headers: HashMap::new(),
        body: Bytes::from_static(b"old"),
        stored_at: Utc::now(),
    };
    blobs.put("static-v0", "GET https://desk.example.com/app.js", old).await.unwrap();
    worker.install().await;

    match worker.dispatch(WorkerEvent::Activate).await.unwrap() {
        WorkerOutcome::Activated {
            deleted_stores,
            replay_registered,
        } => {
            assert_eq!(deleted_stores, vec!["static-v0".to_string()]);
            assert!(!replay_registered);
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let namespaces = blobs.list_namespaces().await.unwrap();
    assert!(!namespaces.contains(&"static-v0".to_string()));
    assert!(namespaces.contains(&"static-v1".to_string()));
}

// ============================================================================
// Offline capture and replay
// ============================================================================

#[tokio::test]
async fn test_captured_write_is_queued_then_replayed() {
    let Setup { worker, origin, .. } = setup().await;
    let mut synced = worker
        .events()
        .subscribe()
        .filter(|e| matches!(e, CoreEvent::SyncSuccess { .. }));

    origin.set_offline(true);
    let offline = served(
        worker
            .dispatch(WorkerEvent::Request {
                request: HttpRequest::new(HttpMethod::Post, "/api/tickets")
                    .header("Content-Type", "application/json")
                    .body(Bytes::from_static(br#"{"title":"VPN down"}"#)),
                capture_offline: true,
            })
            .await
            .unwrap(),
    );
    assert_eq!(offline.response.status, 202);
    assert_eq!(offline.response.header(CACHE_SOURCE_HEADER), Some("offline"));
    let body: Value = offline.response.json().unwrap();
    assert_eq!(body["queued"], true);
    let id = body["id"].as_i64().unwrap();

    assert_eq!(worker.coordinator().queue().len().await.unwrap(), 1);
    assert!(worker.coordinator().queue().is_replay_registered());

    origin.set_offline(false);
    origin.serve("/api/tickets", HttpResponse::new(201));

    let report = match worker.dispatch(WorkerEvent::ConnectivityRestored).await.unwrap() {
        WorkerOutcome::Replayed(Some(report)) => report,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(report.succeeded, vec![id]);
    assert!(worker.coordinator().queue().is_empty().await.unwrap());

    match synced.recv().await.unwrap() {
        CoreEvent::SyncSuccess { action } => {
            assert_eq!(action.id, id);
            assert_eq!(action.method, HttpMethod::Post);
            assert_eq!(action.body.as_deref(), Some(r#"{"title":"VPN down"}"#));
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Nothing left to replay, and registration was consumed
    assert!(matches!(
        worker.dispatch(WorkerEvent::ConnectivityRestored).await.unwrap(),
        WorkerOutcome::Replayed(None)
    ));
}

#[tokio::test]
async fn test_capture_passes_through_when_online() {
    let Setup { worker, origin, .. } = setup().await;
    origin.serve("/api/tickets", HttpResponse::new(201));

    let served = served(worker.dispatch(request(HttpMethod::Post, "/api/tickets")).await.unwrap());
    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(served.response.status, 201);
    assert!(worker.coordinator().queue().is_empty().await.unwrap());
}

#[tokio::test]
async fn test_reads_are_never_captured() {
    let Setup { worker, origin, .. } = setup().await;
    origin.set_offline(true);

    let served = served(worker.dispatch(request(HttpMethod::Get, "/api/users")).await.unwrap());
    assert_eq!(served.source, ResponseSource::Offline);
    let body: Value = served.response.json().unwrap();
    assert_eq!(body["users"], json!([]));
    assert!(worker.coordinator().queue().is_empty().await.unwrap());
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_queue_offline_action_command() {
    let Setup { worker, origin, .. } = setup().await;
    let command = Command::parse(
        r#"{"type":"QUEUE_OFFLINE_ACTION","url":"/api/tickets/7","method":"PATCH","body":"{\"status\":\"closed\"}"}"#,
    )
    .unwrap();

    let id = match reply(worker.dispatch(WorkerEvent::CommandMessage(command)).await.unwrap()) {
        CommandReply::ActionQueued { id } => id,
        other => panic!("unexpected reply {:?}", other),
    };

    origin.serve("/api/tickets/7", HttpResponse::new(200));
    match reply(
        worker
            .dispatch(WorkerEvent::CommandMessage(Command::ReplayNow))
            .await
            .unwrap(),
    ) {
        CommandReply::ReplayFinished { report } => assert_eq!(report.succeeded, vec![id]),
        other => panic!("unexpected reply {:?}", other),
    }
    assert_eq!(
        origin.requests().last(),
        Some(&(HttpMethod::Patch, format!("{}/api/tickets/7", ORIGIN)))
    );
}

#[tokio::test]
async fn test_queue_offline_action_rejects_reads() {
    let Setup { worker, .. } = setup().await;
    let command = Command::QueueOfflineAction {
        url: "/api/tickets".to_string(),
        method: HttpMethod::Get,
        headers: HashMap::new(),
        body: None,
    };

    assert!(matches!(
        worker.execute(command).await,
        Err(CoreError::Sync(_))
    ));
}

#[tokio::test]
async fn test_cached_api_response_serves_offline() {
    let Setup { worker, origin, .. } = setup().await;
    let command = Command::parse(
        r#"{"type":"CACHE_API_RESPONSE","url":"/api/users","response":{"status":200,"body":{"users":[{"id":1}]}}}"#,
    )
    .unwrap();

    assert_eq!(
        reply(worker.dispatch(WorkerEvent::CommandMessage(command)).await.unwrap()),
        CommandReply::ResponseCached { stored: true }
    );

    origin.set_offline(true);
    let mut updates = worker
        .events()
        .subscribe()
        .filter(|e| matches!(e, CoreEvent::CacheUpdate { .. }));
    let served = served(worker.dispatch(request(HttpMethod::Get, "/api/users")).await.unwrap());

    assert_eq!(served.source, ResponseSource::Cache { stale: false });
    let body: Value = served.response.json().unwrap();
    assert_eq!(body["users"][0]["id"], 1);
    match updates.recv().await.unwrap() {
        CoreEvent::CacheUpdate { source, .. } => assert_eq!(source, UpdateSource::Cache),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_cache_api_response_refuses_denied_urls() {
    let Setup { worker, blobs, .. } = setup().await;
    let command = Command::CacheApiResponse {
        url: "/api/auth/login".to_string(),
        response: serde_json::from_value(json!({"body": {"token": "secret"}})).unwrap(),
    };

    assert!(matches!(
        worker.execute(command).await,
        Err(CoreError::Cache(CacheError::Refused { .. }))
    ));
    assert!(blobs.list_keys("api-v1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_metrics_replies_and_broadcasts() {
    let Setup { worker, .. } = setup().await;
    let mut stream = worker.events().subscribe();

    worker.install().await;
    let counters = match worker.execute(Command::GetMetrics).await.unwrap() {
        CommandReply::Metrics { counters, .. } => counters,
        other => panic!("unexpected reply {:?}", other),
    };
    assert_eq!(counters.network_requests, 3);

    match stream.recv().await.unwrap() {
        CoreEvent::PerformanceMetrics { counters: sent, .. } => assert_eq!(sent, counters),
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_clear_cache_and_purge_queue() {
    let Setup { worker, origin, .. } = setup().await;
    worker.install().await;

    origin.set_offline(true);
    worker.dispatch(request(HttpMethod::Post, "/api/tickets")).await.unwrap();
    worker.dispatch(request(HttpMethod::Delete, "/api/tickets/3")).await.unwrap();

    assert_eq!(
        worker.execute(Command::ClearCache).await.unwrap(),
        CommandReply::CacheCleared { removed: 3 }
    );
    assert_eq!(
        worker.execute(Command::PurgeQueue).await.unwrap(),
        CommandReply::QueuePurged { removed: 2 }
    );
    assert!(!worker.coordinator().queue().is_replay_registered());
}

// ============================================================================
// Notifications
// ============================================================================

#[tokio::test]
async fn test_push_is_shown_with_defaults() {
    let Setup { worker, host, .. } = setup().await;

    let payload = Bytes::from_static(br#"{"title":"Ticket #42","body":"Assigned to you","data":{"ticketId":"42"}}"#);
    match worker.dispatch(WorkerEvent::PushReceived(payload)).await.unwrap() {
        WorkerOutcome::NotificationShown(spec) => assert_eq!(spec.title, "Ticket #42"),
        other => panic!("unexpected outcome {:?}", other),
    }

    let shown = host.shown.lock().unwrap().clone();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].body, "Assigned to you");
    assert_eq!(shown[0].data["ticketId"], "42");
}

#[tokio::test]
async fn test_click_focuses_existing_window() {
    let Setup { worker, host, .. } = setup().await;
    host.windows.lock().unwrap().push(ClientWindow {
        id: "w1".to_string(),
        url: format!("{}/dashboard", ORIGIN),
        focused: false,
    });

    let outcome = worker
        .dispatch(WorkerEvent::NotificationClicked {
            action: None,
            data: json!({}),
        })
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        WorkerOutcome::NotificationClicked(ClickOutcome::Focused { ref window_id }) if window_id == "w1"
    ));
    assert_eq!(host.focused.lock().unwrap().clone(), vec!["w1".to_string()]);
    assert!(host.opened.lock().unwrap().is_empty());
}
