#![deny(unsafe_code)]

//! overlayctl core: drive an overlay-network daemon's exit routing.
//!
//! The daemon's control transport is callback based. This crate turns its
//! callbacks into awaited results ([`rpc`]), reads the daemon's status
//! document ([`status`]), and maps or unmaps the exit range ([`exit`]).

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Operator-facing error taxonomy.
pub mod error;
/// Exit session controller (`up` / `down`).
pub mod exit;
/// Global log subscriber and line formats.
pub mod logging;
/// Callback transport, call bridge, and connection handshake.
pub mod rpc;
/// Status document traversal.
pub mod status;

pub use error::ControlError;
pub use exit::{ControlSettings, ExitController, ExitMode, ExitReport, SessionState};
pub use logging::{LogSettings, LogStyle};
pub use rpc::{ConnectionId, Endpoint, HttpTransport, RpcSession, Transport};
pub use status::{InterfaceExtractor, StatusSnapshot};
