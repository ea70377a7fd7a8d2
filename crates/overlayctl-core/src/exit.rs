//! Exit session controller: route all traffic through an exit peer, or stop.
//!
//! ```text
//! Idle ──▶ ResolvingStatus ──▶ Enabling ──▶ Done
//!   │            │         └─▶ Disabling ─▶ Done
//!   └────────────┴──────── any error ─────▶ Failed
//! ```
//!
//! Enabling inspects the daemon's reply and surfaces its `error` string.
//! Disabling is best effort: the reply, and whether there was one, is
//! ignored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use overlayctl_config::RpcConfig;

use crate::error::ControlError;
use crate::rpc::{self, Endpoint, METHOD_EXIT, RpcSession, Transport};
use crate::status::{self, InterfaceExtractor, StatusSnapshot};

/// The traffic range mapped to the exit: everything.
pub const FULL_RANGE: &str = "0.0.0.0/0";

/// What one invocation asks for. Up and down never appear together.
#[derive(Clone, PartialEq, Eq)]
pub enum ExitMode {
    Up {
        exit: String,
        token: Option<String>,
    },
    Down,
}

impl ExitMode {
    /// Build the mode from the `--up` / `--down` flags.
    pub fn from_flags(
        up: bool,
        down: bool,
        exit: Option<String>,
        token: Option<String>,
    ) -> Result<Self, ControlError> {
        match (up, down) {
            (true, true) => Err(ControlError::Usage(
                "--up and --down are mutually exclusive".to_string(),
            )),
            (false, false) => Err(ControlError::Usage(
                "one of --up or --down is required".to_string(),
            )),
            (true, false) => Ok(ExitMode::Up {
                exit: exit.unwrap_or_default(),
                token,
            }),
            (false, true) => Ok(ExitMode::Down),
        }
    }

    /// Reject inputs that must never reach the network.
    pub fn validate(&self) -> Result<(), ControlError> {
        match self {
            ExitMode::Up { exit, .. } if exit.is_empty() => Err(ControlError::Usage(
                "no exit address provided".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// The same mode with any auth token dropped, for reporting.
    pub fn without_token(&self) -> Self {
        match self {
            ExitMode::Up { exit, .. } => ExitMode::Up {
                exit: exit.clone(),
                token: None,
            },
            ExitMode::Down => ExitMode::Down,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExitMode::Up { .. } => "up",
            ExitMode::Down => "down",
        }
    }
}

impl fmt::Debug for ExitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitMode::Up { exit, token } => f
                .debug_struct("Up")
                .field("exit", exit)
                .field("token", &token.as_ref().map(|_| "[REDACTED]"))
                .finish(),
            ExitMode::Down => f.write_str("Down"),
        }
    }
}

/// Arguments of an enable call. Lives only for the duration of that call;
/// the token is wiped on drop.
pub struct ExitRequest {
    exit: String,
    token: Option<Zeroizing<String>>,
}

impl ExitRequest {
    pub fn new(exit: &str, token: Option<&str>) -> Result<Self, ControlError> {
        if exit.is_empty() {
            return Err(ControlError::Usage("no exit address provided".to_string()));
        }
        Ok(Self {
            exit: exit.to_string(),
            token: token.map(|t| Zeroizing::new(t.to_string())),
        })
    }

    /// `{exit, range, token?}`
    pub fn to_args(&self) -> Value {
        let mut args = Map::new();
        args.insert("exit".to_string(), Value::from(self.exit.as_str()));
        args.insert("range".to_string(), Value::from(FULL_RANGE));
        if let Some(token) = &self.token {
            args.insert("token".to_string(), Value::from(token.as_str()));
        }
        Value::Object(args)
    }
}

impl fmt::Debug for ExitRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitRequest")
            .field("exit", &self.exit)
            .field("range", &FULL_RANGE)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// `{range, unmap: true}`
pub fn unmap_args() -> Value {
    json!({ "range": FULL_RANGE, "unmap": true })
}

/// Controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    ResolvingStatus,
    Enabling,
    Disabling,
    Done,
    Failed,
}

/// Per-run settings taken from configuration and flags.
#[derive(Debug, Clone)]
pub struct ControlSettings {
    /// Logical endpoint whose interface is resolved.
    pub endpoint_name: String,
    pub connect_timeout: Option<Duration>,
    pub call_timeout: Option<Duration>,
}

fn secs(n: u64) -> Option<Duration> {
    (n > 0).then(|| Duration::from_secs(n))
}

impl ControlSettings {
    pub fn from_config(rpc: &RpcConfig) -> Self {
        Self {
            endpoint_name: rpc.endpoint.clone(),
            connect_timeout: secs(rpc.connect_timeout_secs),
            call_timeout: secs(rpc.call_timeout_secs),
        }
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::from_config(&RpcConfig::default())
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitReport {
    /// What was carried out. Never holds a token.
    pub mode: ExitMode,
    pub status: StatusSnapshot,
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            ExitMode::Up { exit, .. } => write!(f, "exit {exit} enabled for {FULL_RANGE}")?,
            ExitMode::Down => write!(f, "exit disabled for {FULL_RANGE}")?,
        }
        write!(
            f,
            " (interface {}, first hops: {})",
            self.status.interface,
            if self.status.first_hops.is_empty() {
                "none".to_string()
            } else {
                self.status.first_hops.join(", ")
            }
        )
    }
}

/// Drives one up or down operation against the daemon.
pub struct ExitController {
    transport: Arc<dyn Transport>,
    extractor: &'static dyn InterfaceExtractor,
    settings: ControlSettings,
    state: SessionState,
}

impl ExitController {
    pub fn new(transport: Arc<dyn Transport>, settings: ControlSettings) -> Self {
        Self {
            transport,
            extractor: status::platform_extractor(),
            settings,
            state: SessionState::Idle,
        }
    }

    /// Override the interface extraction rule.
    pub fn with_extractor(mut self, extractor: &'static dyn InterfaceExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "exit session transition");
        self.state = next;
    }

    /// Validate, connect, resolve status, then enable or disable.
    pub async fn run(
        &mut self,
        endpoint: &Endpoint,
        mode: &ExitMode,
    ) -> Result<ExitReport, ControlError> {
        let result = self.drive(endpoint, mode).await;
        match &result {
            Ok(_) => self.transition(SessionState::Done),
            Err(e) => {
                warn!(mode = mode.label(), error = %e, "exit session failed");
                self.transition(SessionState::Failed);
            }
        }
        result
    }

    async fn drive(
        &mut self,
        endpoint: &Endpoint,
        mode: &ExitMode,
    ) -> Result<ExitReport, ControlError> {
        mode.validate()?;

        let conn = rpc::connect(
            self.transport.as_ref(),
            endpoint,
            self.settings.connect_timeout,
        )
        .await?;
        let session = RpcSession::new(
            Arc::clone(&self.transport),
            conn,
            self.settings.call_timeout,
        );

        self.transition(SessionState::ResolvingStatus);
        let status =
            status::resolve_status(&session, &self.settings.endpoint_name, self.extractor)
                .await?;

        match mode {
            ExitMode::Up { exit, token } => {
                self.enable(&session, exit, token.as_deref()).await?
            }
            ExitMode::Down => self.disable(&session).await?,
        }

        Ok(ExitReport {
            mode: mode.without_token(),
            status,
        })
    }

    /// Map the full range to `exit`.
    pub async fn enable(
        &mut self,
        session: &RpcSession,
        exit: &str,
        token: Option<&str>,
    ) -> Result<(), ControlError> {
        let request = ExitRequest::new(exit, token)?;
        self.transition(SessionState::Enabling);
        debug!(?request, "requesting exit");

        let reply = session
            .call(METHOD_EXIT, Some(&request.to_args()))
            .await?
            .ok_or(ControlError::ExitRequestFailed)?;

        if let Some(message) = reply.get("error").and_then(Value::as_str) {
            return Err(ControlError::ExitRejected(message.to_string()));
        }
        info!(exit, range = FULL_RANGE, "exit enabled");
        Ok(())
    }

    /// Unmap the full range. The daemon's answer is not inspected.
    pub async fn disable(&mut self, session: &RpcSession) -> Result<(), ControlError> {
        self.transition(SessionState::Disabling);
        match session.call(METHOD_EXIT, Some(&unmap_args())).await? {
            Some(reply) => debug!(%reply, "unmap reply ignored"),
            None => debug!("unmap call returned no value"),
        }
        info!(range = FULL_RANGE, "exit disabled");
        Ok(())
    }
}
