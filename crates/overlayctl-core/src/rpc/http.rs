//! HTTP/1.1 transport: RPC calls as `POST /<method>` over TCP or a Unix socket.
//!
//! Each connection is one hyper HTTP/1.1 client connection driven by its own
//! task. Requests are issued from spawned tasks and report back through the
//! [`Transport`] callbacks, so the caller never blocks inside the transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::client::conn::http1::SendRequest;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::endpoint::Endpoint;
use super::transport::{ConnectionId, OnConnectFailed, OnConnected, OnReply, Transport};

type Sender = Arc<tokio::sync::Mutex<SendRequest<Full<Bytes>>>>;

/// Errors raised while opening or using an HTTP connection.
#[derive(Debug, thiserror::Error)]
pub enum HttpTransportError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    #[error("HTTP handshake failed: {0}")]
    Handshake(hyper::Error),

    #[error("ipc endpoints are only supported on unix targets")]
    IpcUnsupported,

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("failed to build request: {0}")]
    Build(String),

    #[error("request failed: {0}")]
    Request(hyper::Error),

    #[error("daemon answered {0}")]
    Status(hyper::StatusCode),
}

/// Callback-driven HTTP transport bound to a tokio runtime.
pub struct HttpTransport {
    runtime: Handle,
    next_id: AtomicU64,
    connections: Arc<Mutex<HashMap<ConnectionId, Sender>>>,
}

impl HttpTransport {
    /// Create a transport that spawns its I/O onto the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        Self::with_runtime(Handle::current())
    }

    /// Create a transport that spawns its I/O onto `runtime`.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn sender(&self, conn: ConnectionId) -> Option<Sender> {
        self.connections
            .lock()
            .ok()
            .and_then(|c| c.get(&conn).cloned())
    }
}

async fn handshake<S>(stream: S) -> Result<SendRequest<Full<Bytes>>, HttpTransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(HttpTransportError::Handshake)?;

    // Drive the connection in the background
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!(error = %e, "RPC connection error");
        }
    });
    Ok(sender)
}

async fn open(endpoint: &Endpoint) -> Result<SendRequest<Full<Bytes>>, HttpTransportError> {
    let connect_err = |source| HttpTransportError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };
    match endpoint {
        Endpoint::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(connect_err)?;
            handshake(stream).await
        }
        #[cfg(unix)]
        Endpoint::Ipc(path) => {
            let stream = tokio::net::UnixStream::connect(path)
                .await
                .map_err(connect_err)?;
            handshake(stream).await
        }
        #[cfg(not(unix))]
        Endpoint::Ipc(_) => Err(HttpTransportError::IpcUnsupported),
    }
}

async fn post(
    sender: Sender,
    method: &str,
    payload: Option<String>,
) -> Result<Bytes, HttpTransportError> {
    let mut builder = hyper::Request::builder()
        .method(hyper::Method::POST)
        .uri(format!("/{method}"))
        .header("host", "localhost");
    if payload.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let req = builder
        .body(Full::new(payload.map(Bytes::from).unwrap_or_default()))
        .map_err(|e| HttpTransportError::Build(e.to_string()))?;

    // One request at a time per HTTP/1.1 connection
    let resp = {
        let mut sender = sender.lock().await;
        sender.ready().await.map_err(HttpTransportError::Request)?;
        sender
            .send_request(req)
            .await
            .map_err(HttpTransportError::Request)?
    };

    // Only 2xx bodies are replies; the daemon reports refusals inside a 200.
    let status = resp.status();
    if !status.is_success() {
        return Err(HttpTransportError::Status(status));
    }
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(HttpTransportError::Request)?
        .to_bytes();
    Ok(body)
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn connect_remote(
        &self,
        endpoint: &Endpoint,
        on_connected: OnConnected,
        on_failed: OnConnectFailed,
    ) {
        let endpoint = endpoint.clone();
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let connections = Arc::clone(&self.connections);

        self.runtime.spawn(async move {
            match open(&endpoint).await {
                Ok(sender) => {
                    if let Ok(mut map) = connections.lock() {
                        map.insert(id, Arc::new(tokio::sync::Mutex::new(sender)));
                    }
                    on_connected(id);
                }
                Err(e) => on_failed(e.to_string()),
            }
        });
    }

    fn request(&self, conn: ConnectionId, method: &str, payload: Option<String>, on_reply: OnReply) {
        let Some(sender) = self.sender(conn) else {
            warn!(%conn, method, "{}", HttpTransportError::UnknownConnection(conn));
            on_reply(false, Vec::new());
            return;
        };
        let method = method.to_string();

        self.runtime.spawn(async move {
            match post(sender, &method, payload).await {
                Ok(body) if body.is_empty() => on_reply(true, Vec::new()),
                Ok(body) => on_reply(true, vec![body.to_vec()]),
                Err(e) => {
                    debug!(method, error = %e, "RPC request failed");
                    on_reply(false, Vec::new());
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_connect_refused_reports_failure() {
        // Bind then drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint: Endpoint = format!("tcp://127.0.0.1:{port}").parse().unwrap();

        let transport = HttpTransport::new();
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let tx2 = Arc::clone(&tx);
        transport.connect_remote(
            &endpoint,
            Box::new(move |_| {
                let _ = tx.lock().unwrap().take().unwrap().send(None);
            }),
            Box::new(move |msg| {
                let _ = tx2.lock().unwrap().take().unwrap().send(Some(msg));
            }),
        );

        let msg = rx.await.unwrap().expect("connect should fail");
        assert!(msg.contains("failed to connect"));
        assert_eq!(transport.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_request_on_unknown_connection_fails() {
        let transport = HttpTransport::new();
        let (tx, rx) = oneshot::channel();
        transport.request(
            ConnectionId::new(99),
            "llarp.status",
            None,
            Box::new(move |ok, fragments| {
                let _ = tx.send((ok, fragments));
            }),
        );
        let (ok, fragments) = rx.await.unwrap();
        assert!(!ok);
        assert!(fragments.is_empty());
    }

    #[cfg(not(unix))]
    #[test]
    fn test_ipc_unsupported_message() {
        assert!(HttpTransportError::IpcUnsupported.to_string().contains("unix"));
    }
}
