//! Fake control endpoint: an axum router answering `POST /<method>`.
//!
//! Serves canned replies over real sockets so the HTTP transport and the
//! CLI can be exercised end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

/// A canned answer for one method.
#[derive(Debug, Clone)]
pub struct CannedReply {
    pub status: StatusCode,
    pub body: String,
}

impl CannedReply {
    pub fn json(value: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body: value.to_string(),
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
        }
    }
}

/// A request the fake daemon received.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedCall {
    pub method: String,
    /// Request body parsed as JSON; `None` for an empty body.
    pub args: Option<Value>,
}

#[derive(Default)]
pub struct FakeDaemonState {
    replies: Mutex<HashMap<String, CannedReply>>,
    received: Mutex<Vec<ReceivedCall>>,
}

/// Build the fake daemon's router. Unknown methods answer `404`.
pub fn router(state: Arc<FakeDaemonState>) -> Router {
    Router::new()
        .route("/{method}", post(handle_call))
        .with_state(state)
}

async fn handle_call(
    State(state): State<Arc<FakeDaemonState>>,
    Path(method): Path<String>,
    body: Bytes,
) -> (StatusCode, String) {
    let args = serde_json::from_slice(&body).ok();
    state.received.lock().unwrap().push(ReceivedCall {
        method: method.clone(),
        args,
    });
    match state.replies.lock().unwrap().get(&method) {
        Some(reply) => (reply.status, reply.body.clone()),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

/// A running fake daemon. Stops serving when dropped.
pub struct FakeDaemon {
    url: String,
    state: Arc<FakeDaemonState>,
    _shutdown: oneshot::Sender<()>,
}

impl FakeDaemon {
    /// Serve on an ephemeral loopback TCP port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake daemon");
        let addr = listener.local_addr().expect("no local addr");
        let url = format!("tcp://{addr}");
        let state = Arc::new(FakeDaemonState::default());
        let (tx, rx) = oneshot::channel();

        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .ok();
        });
        info!(%url, "fake daemon listening");

        Self {
            url,
            state,
            _shutdown: tx,
        }
    }

    /// Serve on a Unix socket at `path`.
    #[cfg(unix)]
    pub async fn start_unix(path: &std::path::Path) -> Self {
        std::fs::remove_file(path).ok();
        let listener =
            tokio::net::UnixListener::bind(path).expect("failed to bind fake daemon socket");
        let url = format!("ipc://{}", path.display());
        let state = Arc::new(FakeDaemonState::default());
        let (tx, rx) = oneshot::channel();

        let app = router(Arc::clone(&state));
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
                .ok();
        });

        Self {
            url,
            state,
            _shutdown: tx,
        }
    }

    /// Control-endpoint URL for this daemon.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Answer `method` with `reply` from now on.
    pub fn set_reply(&self, method: &str, reply: CannedReply) {
        self.state
            .replies
            .lock()
            .unwrap()
            .insert(method.to_string(), reply);
    }

    pub fn set_json(&self, method: &str, value: Value) {
        self.set_reply(method, CannedReply::json(value));
    }

    pub fn received(&self) -> Vec<ReceivedCall> {
        self.state.received.lock().unwrap().clone()
    }
}
