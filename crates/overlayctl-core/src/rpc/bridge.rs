//! Call bridge: one callback-based request turned into one awaited result.
//!
//! Every call owns a fresh `oneshot` channel whose sender is moved into the
//! transport's completion callback. The `FnOnce` bound and the consuming
//! `send` make "resolved exactly once" a property of the types.
//!
//! Outcomes are split in two tiers:
//! - `Ok(None)` is a soft failure: the transport reported failure, returned no
//!   fragments, timed out, or dropped the callback.
//! - `Err(CallError)` is a hard failure: the daemon answered with bytes that
//!   are not valid UTF-8 JSON, or the arguments could not be serialized.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::transport::{ConnectionId, Fragment, Transport};

/// Hard failures of a single RPC call.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("failed to serialize arguments for {method}: {source}")]
    Serialize {
        method: String,
        source: serde_json::Error,
    },

    #[error("malformed response to {method}: {source}")]
    MalformedResponse {
        method: String,
        source: serde_json::Error,
    },
}

/// Issue `method` on `conn` and wait for its single completion.
///
/// Returns the first reply fragment parsed as JSON, or `None` when the call
/// failed at the transport level. `timeout` bounds the wait; `None` waits
/// until the transport answers.
pub async fn call<T: Transport + ?Sized>(
    transport: &T,
    conn: ConnectionId,
    method: &str,
    args: Option<&Value>,
    timeout: Option<Duration>,
) -> Result<Option<Value>, CallError> {
    let payload = args
        .map(serde_json::to_string)
        .transpose()
        .map_err(|source| CallError::Serialize {
            method: method.to_string(),
            source,
        })?;

    debug!(%conn, method, has_args = payload.is_some(), "rpc call");

    let (tx, rx) = oneshot::channel::<Option<Fragment>>();
    transport.request(
        conn,
        method,
        payload,
        Box::new(move |success, fragments| {
            let first = if success {
                fragments.into_iter().next()
            } else {
                None
            };
            // The receiver is gone only if the caller timed out.
            let _ = tx.send(first);
        }),
    );

    let reply = match timeout {
        Some(limit) => match tokio::time::timeout(limit, rx).await {
            Ok(reply) => reply,
            Err(_) => {
                warn!(method, ?limit, "rpc call timed out");
                return Ok(None);
            }
        },
        None => rx.await,
    };

    let raw = match reply {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(method, "rpc call returned no value");
            return Ok(None);
        }
        Err(_) => {
            warn!(method, "transport dropped the reply handler");
            return Ok(None);
        }
    };

    trace!(method, reply = %String::from_utf8_lossy(&raw), "rpc reply");
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|source| CallError::MalformedResponse {
            method: method.to_string(),
            source,
        })
}

/// A connected transport plus the per-call policy, shared by every call site.
#[derive(Clone)]
pub struct RpcSession {
    transport: Arc<dyn Transport>,
    conn: ConnectionId,
    call_timeout: Option<Duration>,
}

impl RpcSession {
    pub fn new(
        transport: Arc<dyn Transport>,
        conn: ConnectionId,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            conn,
            call_timeout,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.conn
    }

    /// See [`call`].
    pub async fn call(
        &self,
        method: &str,
        args: Option<&Value>,
    ) -> Result<Option<Value>, CallError> {
        call(
            self.transport.as_ref(),
            self.conn,
            method,
            args,
            self.call_timeout,
        )
        .await
    }
}
