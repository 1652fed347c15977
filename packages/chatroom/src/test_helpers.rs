//! Test fixtures: an in-process chat service and a recording transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message as WsFrame, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::transport::{StreamEvent, StreamEventKind, StreamHandle, Transport};
use crate::types::Session;

/// Timeout for each async operation in tests.
pub(crate) const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn session(id: &str, name: &str, active_users: u64) -> Session {
    Session {
        session_id: id.to_string(),
        name: name.to_string(),
        active_users,
    }
}

// =============================================================================
// In-process chat service
// =============================================================================

/// Session id the test server refuses to upgrade (responds 404).
pub(crate) const MISSING_SESSION: &str = "missing";

#[derive(Clone)]
struct ServiceState {
    sessions: Arc<Mutex<Vec<Session>>>,
    fail_directory: Arc<AtomicBool>,
    /// Answer creates with `{"message": ...}` instead of the session
    confirm_create_only: Arc<AtomicBool>,
    next_id: Arc<AtomicUsize>,
    /// (session_id, user_id) per accepted stream
    connects: Arc<Mutex<Vec<(String, String)>>>,
    /// (session_id, raw text) per inbound client frame
    received: Arc<Mutex<Vec<(String, String)>>>,
    disconnects: Arc<AtomicUsize>,
    /// (session_id, raw frame) pushed to every stream on that session
    push_tx: broadcast::Sender<(String, String)>,
}

pub(crate) struct TestServer {
    pub base_url: String,
    state: ServiceState,
    _shutdown: oneshot::Sender<()>,
}

#[derive(Deserialize)]
struct CreateRequest {
    name: String,
}

impl TestServer {
    /// Bind `127.0.0.1:0` and serve the directory and stream routes.
    pub async fn start(sessions: Vec<Session>) -> Self {
        let (push_tx, _) = broadcast::channel(64);
        let state = ServiceState {
            sessions: Arc::new(Mutex::new(sessions)),
            fail_directory: Arc::new(AtomicBool::new(false)),
            confirm_create_only: Arc::new(AtomicBool::new(false)),
            next_id: Arc::new(AtomicUsize::new(1)),
            connects: Arc::new(Mutex::new(Vec::new())),
            received: Arc::new(Mutex::new(Vec::new())),
            disconnects: Arc::new(AtomicUsize::new(0)),
            push_tx,
        };

        let app = Router::new()
            .route("/session/list", get(list_sessions))
            .route("/session/create", post(create_session))
            .route("/session/connect/{session_id}/{user_id}", get(connect))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            base_url: format!("http://127.0.0.1:{port}"),
            state,
            _shutdown: tx,
        }
    }

    pub fn fail_directory(&self, fail: bool) {
        self.state.fail_directory.store(fail, Ordering::SeqCst);
    }

    pub fn confirm_create_only(&self, enabled: bool) {
        self.state.confirm_create_only.store(enabled, Ordering::SeqCst);
    }

    /// Push a raw frame to every stream connected to `session_id`.
    pub fn push(&self, session_id: &str, frame: &str) {
        let _ = self
            .state
            .push_tx
            .send((session_id.to_string(), frame.to_string()));
    }

    pub fn connects(&self) -> Vec<(String, String)> {
        self.state.connects.lock().unwrap().clone()
    }

    pub fn received(&self) -> Vec<(String, String)> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Poll until `check` holds or the test timeout elapses.
    pub async fn wait_for(&self, check: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if check(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check(self)
    }
}

async fn list_sessions(State(state): State<ServiceState>) -> Response {
    if state.fail_directory.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "directory down").into_response();
    }
    let sessions = state.sessions.lock().unwrap().clone();
    Json(serde_json::json!({ "sessions": sessions })).into_response()
}

async fn create_session(
    State(state): State<ServiceState>,
    Json(req): Json<CreateRequest>,
) -> Response {
    if state.fail_directory.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "directory down").into_response();
    }
    let id = format!("new-{}", state.next_id.fetch_add(1, Ordering::SeqCst));
    let created = session(&id, &req.name, 0);
    state.sessions.lock().unwrap().push(created.clone());
    if state.confirm_create_only.load(Ordering::SeqCst) {
        return Json(serde_json::json!({ "message": "Session created" })).into_response();
    }
    Json(created).into_response()
}

async fn connect(
    State(state): State<ServiceState>,
    Path((session_id, user_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Response {
    if session_id == MISSING_SESSION {
        return StatusCode::NOT_FOUND.into_response();
    }
    // Subscribe before the 101 goes out so pushes after "open" are never lost
    let push_rx = state.push_tx.subscribe();
    state
        .connects
        .lock()
        .unwrap()
        .push((session_id.clone(), user_id.clone()));
    ws.on_upgrade(move |socket| serve_stream(socket, state, session_id, user_id, push_rx))
}

/// Echo every inbound text frame back as `{sender_id, message}` and forward
/// pushed frames for this session verbatim.
async fn serve_stream(
    socket: WebSocket,
    state: ServiceState,
    session_id: String,
    user_id: String,
    mut push_rx: broadcast::Receiver<(String, String)>,
) {
    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            pushed = push_rx.recv() => {
                let Ok((target, frame)) = pushed else { break };
                if target == session_id
                    && sender.send(WsFrame::Text(frame.into())).await.is_err()
                {
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(WsFrame::Text(text))) => {
                        let text = text.as_str().to_owned();
                        state
                            .received
                            .lock()
                            .unwrap()
                            .push((session_id.clone(), text.clone()));
                        let echo = serde_json::json!({ "sender_id": user_id, "message": text });
                        if sender.send(WsFrame::Text(echo.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsFrame::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
    state.disconnects.fetch_add(1, Ordering::SeqCst);
}

// =============================================================================
// Recording transport
// =============================================================================

/// One `open` call observed by [`RecordingTransport`].
pub(crate) struct OpenedStream {
    pub url: Url,
    pub generation: u64,
    pub events: mpsc::Sender<StreamEvent>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub cancel: CancellationToken,
    /// Streams of earlier opens that were still live when this one opened.
    pub live_at_open: usize,
}

impl OpenedStream {
    pub fn is_released(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Build an event as this stream's transport task would.
    pub fn event(&self, kind: StreamEventKind) -> StreamEvent {
        StreamEvent {
            generation: self.generation,
            kind,
        }
    }

    pub fn frame(&self, raw: &str) -> StreamEvent {
        self.event(StreamEventKind::Frame(raw.to_string()))
    }
}

/// Transport that opens nothing and records every call, so tests can play
/// the part of the network by hand.
#[derive(Clone, Default)]
pub(crate) struct RecordingTransport {
    opened: Arc<Mutex<Vec<OpenedStream>>>,
}

impl RecordingTransport {
    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn live_count(&self) -> usize {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.is_released())
            .count()
    }

    /// Run `f` against the `index`-th opened stream.
    pub fn with_stream<R>(&self, index: usize, f: impl FnOnce(&mut OpenedStream) -> R) -> R {
        let mut opened = self.opened.lock().unwrap();
        f(&mut opened[index])
    }

    pub fn last_index(&self) -> usize {
        self.open_count() - 1
    }
}

impl Transport for RecordingTransport {
    fn open(&self, url: Url, generation: u64, events: mpsc::Sender<StreamEvent>) -> StreamHandle {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut opened = self.opened.lock().unwrap();
        let live_at_open = opened.iter().filter(|s| !s.is_released()).count();
        opened.push(OpenedStream {
            url,
            generation,
            events,
            outbound: outbound_rx,
            cancel: cancel.clone(),
            live_at_open,
        });
        StreamHandle::new(generation, outbound_tx, cancel)
    }
}
