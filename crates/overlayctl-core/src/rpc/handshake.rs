//! Connection handshake: waits for exactly one of two connect callbacks.
//!
//! ```text
//! connect_remote ──▶ Pending ──on_connected──▶ Connected(ConnectionId)
//!                       │
//!                       └────on_failed──────▶ Failed(message)
//! ```
//!
//! Both callbacks share one `oneshot` sender slot. Whichever fires first
//! takes the sender; the other finds the slot empty and does nothing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::endpoint::Endpoint;
use super::transport::{ConnectionId, Transport};

/// Why a connection could not be established. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("transport abandoned the connection attempt")]
    Abandoned,
}

type Slot = Arc<Mutex<Option<oneshot::Sender<Result<ConnectionId, String>>>>>;

fn resolve(slot: &Slot, outcome: Result<ConnectionId, String>) {
    let sender = slot.lock().ok().and_then(|mut guard| guard.take());
    match sender {
        Some(tx) => {
            let _ = tx.send(outcome);
        }
        None => debug!("connect callback fired after the handshake resolved"),
    }
}

/// Connect to `endpoint` and wait for the outcome.
///
/// With `timeout = None` this waits for as long as the transport takes,
/// which is forever if it never calls back.
pub async fn connect<T: Transport + ?Sized>(
    transport: &T,
    endpoint: &Endpoint,
    timeout: Option<Duration>,
) -> Result<ConnectionId, HandshakeError> {
    let (tx, rx) = oneshot::channel();
    let slot: Slot = Arc::new(Mutex::new(Some(tx)));
    let on_ok = Arc::clone(&slot);
    let on_err = slot;

    debug!(%endpoint, "connecting to control endpoint");
    transport.connect_remote(
        endpoint,
        Box::new(move |conn| resolve(&on_ok, Ok(conn))),
        Box::new(move |msg| resolve(&on_err, Err(msg))),
    );

    let outcome = match timeout {
        Some(limit) => tokio::time::timeout(limit, rx)
            .await
            .map_err(|_| HandshakeError::TimedOut(limit))?,
        None => rx.await,
    };

    match outcome {
        Ok(Ok(conn)) => {
            info!(%endpoint, %conn, "connected to control endpoint");
            Ok(conn)
        }
        Ok(Err(msg)) => {
            warn!(%endpoint, error = %msg, "failed to connect to control endpoint");
            Err(HandshakeError::Failed(msg))
        }
        Err(_) => Err(HandshakeError::Abandoned),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::transport::{OnConnectFailed, OnConnected, OnReply};
    use pretty_assertions::assert_eq;

    enum Behaviour {
        Succeed(u64),
        Fail(&'static str),
        BothSuccessFirst,
        DropBoth,
        Hang,
    }

    struct ScriptedConnect {
        behaviour: Behaviour,
        parked: Mutex<Vec<(OnConnected, OnConnectFailed)>>,
    }

    impl ScriptedConnect {
        fn new(behaviour: Behaviour) -> Self {
            Self {
                behaviour,
                parked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for ScriptedConnect {
        fn connect_remote(&self, _: &Endpoint, ok: OnConnected, err: OnConnectFailed) {
            match self.behaviour {
                Behaviour::Succeed(id) => ok(ConnectionId::new(id)),
                Behaviour::Fail(msg) => err(msg.to_string()),
                Behaviour::BothSuccessFirst => {
                    ok(ConnectionId::new(3));
                    err("late failure".to_string());
                }
                Behaviour::DropBoth => {}
                Behaviour::Hang => self.parked.lock().unwrap().push((ok, err)),
            }
        }

        fn request(&self, _: ConnectionId, _: &str, _: Option<String>, _: OnReply) {
            unreachable!("handshake never issues requests")
        }
    }

    fn endpoint() -> Endpoint {
        "tcp://127.0.0.1:1190".parse().unwrap()
    }

    #[tokio::test]
    async fn test_connected() {
        let t = ScriptedConnect::new(Behaviour::Succeed(42));
        let conn = connect(&t, &endpoint(), None).await.unwrap();
        assert_eq!(conn.raw(), 42);
    }

    #[tokio::test]
    async fn test_failure_message_is_kept() {
        let t = ScriptedConnect::new(Behaviour::Fail("refused"));
        let err = connect(&t, &endpoint(), None).await.unwrap_err();
        assert_eq!(err, HandshakeError::Failed("refused".to_string()));
        assert_eq!(err.to_string(), "refused");
    }

    #[tokio::test]
    async fn test_first_callback_wins() {
        let t = ScriptedConnect::new(Behaviour::BothSuccessFirst);
        let conn = connect(&t, &endpoint(), None).await.unwrap();
        assert_eq!(conn, ConnectionId::new(3));
    }

    #[tokio::test]
    async fn test_dropped_callbacks_abandon() {
        let t = ScriptedConnect::new(Behaviour::DropBoth);
        let err = connect(&t, &endpoint(), None).await.unwrap_err();
        assert_eq!(err, HandshakeError::Abandoned);
    }

    #[tokio::test]
    async fn test_timeout() {
        let t = ScriptedConnect::new(Behaviour::Hang);
        let limit = Duration::from_millis(20);
        let err = connect(&t, &endpoint(), Some(limit)).await.unwrap_err();
        assert_eq!(err, HandshakeError::TimedOut(limit));
    }
}
