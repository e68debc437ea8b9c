//! In-process test server.
//!
//! Serves the same surface the realtime client talks to in production:
//! `GET /ws` (WebSocket, identity in the `userId` query parameter) and the
//! five notification HTTP routes. Test hooks cover seeding, frame pushes,
//! server-initiated closes, simulated mutation failures, and request
//! accounting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch};
use axum::{Json, Router};
use tokio::sync::broadcast;

use plyst_realtime::{Notification, NotificationKind, RealtimeConfig};

/// Instruction broadcast to every live test socket.
#[derive(Clone, Debug)]
enum Directive {
    /// Send a raw text frame.
    Frame(String),
    /// Send a close frame with the given code, then drop the socket.
    Close(u16),
}

/// Observable server state shared with the tests.
pub struct ServerState {
    notifications: Mutex<Vec<Notification>>,
    list_requests: AtomicUsize,
    marked_read: Mutex<Vec<i64>>,
    mark_all_read_requests: Mutex<Vec<i64>>,
    deleted: Mutex<Vec<i64>>,
    delete_all_requests: Mutex<Vec<i64>>,
    /// When set, every mutation endpoint answers 500.
    fail_mutations: AtomicBool,
    upgrades: AtomicUsize,
    connected_user_ids: Mutex<Vec<i64>>,
    directives: broadcast::Sender<Directive>,
}

/// An in-process Plyst server stand-in on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub ws_url: String,
    state: Arc<ServerState>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        // RUST_LOG-controlled diagnostics for debugging test failures.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let (directives, _) = broadcast::channel(64);
        let state = Arc::new(ServerState {
            notifications: Mutex::new(Vec::new()),
            list_requests: AtomicUsize::new(0),
            marked_read: Mutex::new(Vec::new()),
            mark_all_read_requests: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            delete_all_requests: Mutex::new(Vec::new()),
            fail_mutations: AtomicBool::new(false),
            upgrades: AtomicUsize::new(0),
            connected_user_ids: Mutex::new(Vec::new()),
            directives,
        });

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route(
                "/notifications/{id}",
                get(list_notifications).delete(delete_notification),
            )
            .route("/notifications/{id}/unread-count", get(unread_count))
            .route("/notifications/{id}/read", patch(mark_read))
            .route("/notifications/{id}/read-all", patch(mark_all_read))
            .route("/notifications/user/{id}", delete(delete_all))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Test server died");
        });

        Self {
            base_url: format!("http://{}", addr),
            ws_url: format!("ws://{}/ws", addr),
            state,
        }
    }

    /// Client configuration pointing at this server, with a reconnect
    /// delay short enough for tests.
    pub fn client_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            ws_url: self.ws_url.clone(),
            api_base_url: self.base_url.clone(),
            reconnect_delay: Duration::from_millis(200),
        }
    }

    /// Add a notification to the collection served by the list endpoint.
    pub fn seed_notification(&self, notification: Notification) {
        self.state.notifications.lock().unwrap().push(notification);
    }

    /// Push a raw text frame to every connected socket.
    pub fn push_frame(&self, text: impl Into<String>) {
        let _ = self.state.directives.send(Directive::Frame(text.into()));
    }

    /// Push a `new_notification` frame for the given record.
    pub fn push_notification(&self, notification: &Notification) {
        let frame = serde_json::json!({
            "type": "new_notification",
            "notification": notification,
        });
        self.push_frame(frame.to_string());
    }

    /// Close every connected socket with the given close code.
    pub fn close_all(&self, code: u16) {
        let _ = self.state.directives.send(Directive::Close(code));
    }

    /// Make every mutation endpoint answer 500 from now on.
    pub fn fail_mutations(&self) {
        self.state.fail_mutations.store(true, Ordering::SeqCst);
    }

    /// Number of WebSocket upgrades the server has accepted.
    pub fn upgrade_count(&self) -> usize {
        self.state.upgrades.load(Ordering::SeqCst)
    }

    /// Identities seen in upgrade query parameters, in order.
    pub fn connected_user_ids(&self) -> Vec<i64> {
        self.state.connected_user_ids.lock().unwrap().clone()
    }

    /// Number of collection GETs served.
    pub fn list_request_count(&self) -> usize {
        self.state.list_requests.load(Ordering::SeqCst)
    }

    /// Ids the client asked to mark as read, in order.
    pub fn marked_read(&self) -> Vec<i64> {
        self.state.marked_read.lock().unwrap().clone()
    }

    /// User ids the client asked to mark-all-read for, in order.
    pub fn mark_all_read_requests(&self) -> Vec<i64> {
        self.state.mark_all_read_requests.lock().unwrap().clone()
    }

    /// Ids the client asked to delete, in order.
    pub fn deleted(&self) -> Vec<i64> {
        self.state.deleted.lock().unwrap().clone()
    }

    /// User ids the client asked to clear-all for, in order.
    pub fn delete_all_requests(&self) -> Vec<i64> {
        self.state.delete_all_requests.lock().unwrap().clone()
    }
}

/// Build a notification record for tests.
pub fn sample_notification(id: i64, is_read: bool) -> Notification {
    Notification {
        id,
        kind: NotificationKind::Like,
        title: format!("Notification {}", id),
        message: "somebody liked your playlist".to_string(),
        avatar: "🎧".to_string(),
        is_read,
        related_id: Some(10),
        time: "just now".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

/// Poll a condition until it holds or the timeout elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

async fn ws_handler(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let user_id = params.get("userId").and_then(|v| v.parse::<i64>().ok());
    let Some(user_id) = user_id else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    state.upgrades.fetch_add(1, Ordering::SeqCst);
    state.connected_user_ids.lock().unwrap().push(user_id);

    // Subscribe before completing the upgrade so no pushed frame can slip
    // between the client observing the connection and us listening.
    let directives = state.directives.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, directives))
}

async fn handle_socket(mut socket: WebSocket, mut directives: broadcast::Receiver<Directive>) {
    let handshake = r#"{"type":"connected","message":"WebSocket ready"}"#;
    if socket.send(Message::Text(handshake.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            directive = directives.recv() => match directive {
                Ok(Directive::Frame(text)) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(Directive::Close(code)) => {
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code,
                            reason: "test close".into(),
                        })))
                        .await;
                    break;
                }
                Err(_) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn list_notifications(
    State(state): State<Arc<ServerState>>,
    Path(_user_id): Path<i64>,
) -> Json<Vec<Notification>> {
    state.list_requests.fetch_add(1, Ordering::SeqCst);
    Json(state.notifications.lock().unwrap().clone())
}

async fn unread_count(
    State(state): State<Arc<ServerState>>,
    Path(_user_id): Path<i64>,
) -> Json<serde_json::Value> {
    let count = state
        .notifications
        .lock()
        .unwrap()
        .iter()
        .filter(|n| !n.is_read)
        .count();
    Json(serde_json::json!({ "count": count }))
}

async fn mark_read(State(state): State<Arc<ServerState>>, Path(id): Path<i64>) -> StatusCode {
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.marked_read.lock().unwrap().push(id);
    StatusCode::OK
}

async fn mark_all_read(
    State(state): State<Arc<ServerState>>,
    Path(user_id): Path<i64>,
) -> StatusCode {
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.mark_all_read_requests.lock().unwrap().push(user_id);
    StatusCode::OK
}

async fn delete_notification(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<i64>,
) -> StatusCode {
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.deleted.lock().unwrap().push(id);
    StatusCode::OK
}

async fn delete_all(State(state): State<Arc<ServerState>>, Path(user_id): Path<i64>) -> StatusCode {
    if state.fail_mutations.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.delete_all_requests.lock().unwrap().push(user_id);
    StatusCode::OK
}
