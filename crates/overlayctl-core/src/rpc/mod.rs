//! Daemon RPC: callback transport, call bridge, and connection handshake.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  connect / call   ┌──────────────┐  callbacks   ┌──────────────┐
//! │  controller  │──────────────────▶│  bridge /    │─────────────▶│  Transport   │
//! │  (one task)  │◀── awaited value ─│  handshake   │◀── oneshot ──│  (I/O tasks) │
//! └──────────────┘                   └──────────────┘              └──────────────┘
//! ```

pub mod bridge;
pub mod endpoint;
pub mod handshake;
pub mod http;
pub mod transport;

pub use bridge::{CallError, RpcSession, call};
pub use endpoint::{Endpoint, EndpointError};
pub use handshake::{HandshakeError, connect};
pub use http::{HttpTransport, HttpTransportError};
pub use transport::{ConnectionId, Fragment, OnConnectFailed, OnConnected, OnReply, Transport};

/// RPC method returning the daemon's status document.
pub const METHOD_STATUS: &str = "llarp.status";

/// RPC method that maps or unmaps an exit range.
pub const METHOD_EXIT: &str = "llarp.exit";
