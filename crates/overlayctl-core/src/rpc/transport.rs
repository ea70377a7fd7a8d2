//! Callback-style transport seam.
//!
//! A [`Transport`] never blocks: it accepts completion callbacks and invokes
//! them later, possibly from one of its own I/O tasks. The bridge and
//! handshake modules turn those callbacks back into awaited results.

use std::fmt;

use super::endpoint::Endpoint;

/// Opaque handle to an established control connection.
///
/// Minted by the transport on a successful connect and valid for the rest of
/// the process. It is never re-created or retried within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wrap a transport-assigned identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Fired once when a connection is established.
pub type OnConnected = Box<dyn FnOnce(ConnectionId) + Send + 'static>;

/// Fired once when a connection attempt fails, with a diagnostic message.
pub type OnConnectFailed = Box<dyn FnOnce(String) + Send + 'static>;

/// One undecoded piece of a reply body.
pub type Fragment = Vec<u8>;

/// Fired once per request with a success flag and the raw reply fragments.
///
/// Fragments are handed over byte for byte; decoding them is the caller's job.
pub type OnReply = Box<dyn FnOnce(bool, Vec<Fragment>) + Send + 'static>;

/// An asynchronous, callback-driven RPC transport.
pub trait Transport: Send + Sync {
    /// Start connecting to `endpoint`.
    ///
    /// Exactly one of `on_connected` / `on_failed` is expected to fire. A
    /// transport that drops both without calling either is treated as a
    /// failed connect by the handshake.
    fn connect_remote(
        &self,
        endpoint: &Endpoint,
        on_connected: OnConnected,
        on_failed: OnConnectFailed,
    );

    /// Issue `method` on `conn` with an optional serialized payload.
    fn request(&self, conn: ConnectionId, method: &str, payload: Option<String>, on_reply: OnReply);
}
