//! Operator-facing error taxonomy.
//!
//! Every variant is terminal: nothing is retried and the CLI exits non-zero.

use crate::rpc::{CallError, EndpointError, HandshakeError};
use crate::status::{StatusError, TraversalError};

/// Errors that end an up/down run.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("{0}")]
    Usage(String),

    #[error("failed to connect to daemon RPC: {0}")]
    TransportFailure(String),

    #[error("call to llarp.status failed")]
    StatusUnavailable,

    #[error("failed to parse result: {0}")]
    StatusParse(TraversalError),

    #[error("could not add exit")]
    ExitRequestFailed,

    /// The daemon's own message, shown to the operator unchanged.
    #[error("{0}")]
    ExitRejected(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] CallError),
}

impl ControlError {
    /// Whether the failure happened before any network activity.
    pub fn is_usage(&self) -> bool {
        matches!(self, ControlError::Usage(_))
    }
}

impl From<HandshakeError> for ControlError {
    fn from(e: HandshakeError) -> Self {
        ControlError::TransportFailure(e.to_string())
    }
}

impl From<EndpointError> for ControlError {
    fn from(e: EndpointError) -> Self {
        ControlError::Usage(e.to_string())
    }
}

impl From<StatusError> for ControlError {
    fn from(e: StatusError) -> Self {
        match e {
            StatusError::Unavailable => ControlError::StatusUnavailable,
            StatusError::Parse(cause) => ControlError::StatusParse(cause),
            StatusError::Call(cause) => ControlError::Protocol(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_handshake_failure_keeps_message() {
        let err = ControlError::from(HandshakeError::Failed("refused".to_string()));
        assert!(matches!(err, ControlError::TransportFailure(ref m) if m == "refused"));
        assert_eq!(err.to_string(), "failed to connect to daemon RPC: refused");
    }

    #[test]
    fn test_rejection_displays_verbatim() {
        let err = ControlError::ExitRejected("token invalid".to_string());
        assert_eq!(err.to_string(), "token invalid");
    }

    #[test]
    fn test_bad_endpoint_is_usage_error() {
        let err = ControlError::from(EndpointError::Scheme("http://x".to_string()));
        assert!(err.is_usage());
    }

    #[test]
    fn test_status_errors_map_to_taxonomy() {
        assert!(matches!(
            ControlError::from(StatusError::Unavailable),
            ControlError::StatusUnavailable
        ));
    }
}
