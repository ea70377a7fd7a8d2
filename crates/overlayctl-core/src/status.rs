//! Status resolver: first hops and interface descriptor from `llarp.status`.
//!
//! The daemon's status document has no schema; its shape is a convention.
//! Every step of the walk goes through [`Node`], which records the dotted
//! path it took so a missing key or wrong type comes back as a labelled
//! [`TraversalError`] instead of a panic.
//!
//! ```text
//! result
//! ├── links.outbound[*].sessions.established[*].remoteAddr   → first hops
//! └── services.<endpoint>.ifname | ifaddr                    → interface
//! ```

use std::fmt;

use serde_json::Value;
use tracing::{debug, info};

use crate::rpc::{CallError, METHOD_STATUS, RpcSession};

/// Keys of the status document, in the order they are walked.
pub mod paths {
    pub const RESULT: &str = "result";
    pub const LINKS: &str = "links";
    pub const OUTBOUND: &str = "outbound";
    pub const SESSIONS: &str = "sessions";
    pub const ESTABLISHED: &str = "established";
    pub const REMOTE_ADDR: &str = "remoteAddr";
    pub const SERVICES: &str = "services";
    /// Interface name, read on POSIX-like targets.
    pub const IFNAME: &str = "ifname";
    /// Interface address with subnet suffix, read on Windows.
    pub const IFADDR: &str = "ifaddr";
}

/// What went wrong at a point in the status document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalErrorKind {
    Missing,
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
}

/// A failed step while walking the status document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct TraversalError {
    pub path: String,
    pub kind: TraversalErrorKind,
}

impl fmt::Display for TraversalErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalErrorKind::Missing => f.write_str("missing"),
            TraversalErrorKind::WrongType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A position in the status document together with the path that led there.
#[derive(Debug, Clone)]
pub struct Node<'a> {
    value: &'a Value,
    path: String,
}

impl<'a> Node<'a> {
    /// The document root.
    pub fn root(value: &'a Value) -> Self {
        Self {
            value,
            path: "$".to_string(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn wrong_type(&self, expected: &'static str) -> TraversalError {
        TraversalError {
            path: self.path.clone(),
            kind: TraversalErrorKind::WrongType {
                expected,
                found: type_name(self.value),
            },
        }
    }

    /// Step into object member `key`.
    pub fn get(&self, key: &str) -> Result<Node<'a>, TraversalError> {
        let object = self.value.as_object().ok_or_else(|| self.wrong_type("object"))?;
        let path = format!("{}.{key}", self.path);
        match object.get(key) {
            Some(value) => Ok(Node { value, path }),
            None => Err(TraversalError {
                path,
                kind: TraversalErrorKind::Missing,
            }),
        }
    }

    /// Walk several object members in turn.
    pub fn get_path(&self, keys: &[&str]) -> Result<Node<'a>, TraversalError> {
        keys.iter()
            .try_fold(self.clone(), |node, key| node.get(key))
    }

    /// The elements of an array node.
    pub fn elements(&self) -> Result<Vec<Node<'a>>, TraversalError> {
        let items = self.value.as_array().ok_or_else(|| self.wrong_type("array"))?;
        Ok(items
            .iter()
            .enumerate()
            .map(|(i, value)| Node {
                value,
                path: format!("{}[{i}]", self.path),
            })
            .collect())
    }

    pub fn as_str(&self) -> Result<&'a str, TraversalError> {
        self.value.as_str().ok_or_else(|| self.wrong_type("string"))
    }
}

/// Host part of a `host:port` address: everything before the first `:`.
pub fn strip_port(addr: &str) -> &str {
    addr.split_once(':').map_or(addr, |(host, _)| host)
}

/// Address part of a `addr/prefix` string: everything before the first `/`.
pub fn strip_subnet(addr: &str) -> &str {
    addr.split_once('/').map_or(addr, |(host, _)| host)
}

/// Reads the interface descriptor out of a service entry.
///
/// One implementation is active per build target; see [`platform_extractor`].
pub trait InterfaceExtractor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn extract(&self, service: &Node<'_>) -> Result<String, TraversalError>;
}

/// POSIX-like targets: the `ifname` field, verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfnameExtractor;

impl InterfaceExtractor for IfnameExtractor {
    fn name(&self) -> &'static str {
        paths::IFNAME
    }

    fn extract(&self, service: &Node<'_>) -> Result<String, TraversalError> {
        Ok(service.get(paths::IFNAME)?.as_str()?.to_string())
    }
}

/// Windows: the `ifaddr` field with any `/prefix` suffix removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfaddrExtractor;

impl InterfaceExtractor for IfaddrExtractor {
    fn name(&self) -> &'static str {
        paths::IFADDR
    }

    fn extract(&self, service: &Node<'_>) -> Result<String, TraversalError> {
        let addr = service.get(paths::IFADDR)?.as_str()?;
        Ok(strip_subnet(addr).to_string())
    }
}

/// The extraction rule for the target this binary was built for.
pub fn platform_extractor() -> &'static dyn InterfaceExtractor {
    #[cfg(windows)]
    {
        &IfaddrExtractor
    }
    #[cfg(not(windows))]
    {
        &IfnameExtractor
    }
}

/// What the resolver learned from one status document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Hosts of every established outbound session, in document order.
    pub first_hops: Vec<String>,
    /// Interface descriptor of the requested logical endpoint.
    pub interface: String,
}

impl StatusSnapshot {
    /// Walk a status document without touching the network.
    pub fn from_document(
        doc: &Value,
        endpoint: &str,
        extractor: &dyn InterfaceExtractor,
    ) -> Result<Self, TraversalError> {
        let result = Node::root(doc).get(paths::RESULT)?;
        Ok(Self {
            first_hops: first_hops(&result)?,
            interface: interface(&result, endpoint, extractor)?,
        })
    }
}

fn first_hops(result: &Node<'_>) -> Result<Vec<String>, TraversalError> {
    let mut hops = Vec::new();
    for link in result.get_path(&[paths::LINKS, paths::OUTBOUND])?.elements()? {
        let sessions = link.get_path(&[paths::SESSIONS, paths::ESTABLISHED])?;
        for session in sessions.elements()? {
            let addr = session.get(paths::REMOTE_ADDR)?.as_str()?;
            hops.push(strip_port(addr).to_string());
        }
    }
    Ok(hops)
}

fn interface(
    result: &Node<'_>,
    endpoint: &str,
    extractor: &dyn InterfaceExtractor,
) -> Result<String, TraversalError> {
    let service = result.get(paths::SERVICES)?.get(endpoint)?;
    extractor.extract(&service)
}

/// Errors from resolving status.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("call to llarp.status failed")]
    Unavailable,

    #[error("failed to parse result: {0}")]
    Parse(#[from] TraversalError),

    #[error(transparent)]
    Call(#[from] CallError),
}

/// Query the daemon's status and extract first hops and the interface of
/// `endpoint`.
///
/// Partial data is never returned: any traversal failure fails the whole
/// resolution.
pub async fn resolve_status(
    session: &RpcSession,
    endpoint: &str,
    extractor: &dyn InterfaceExtractor,
) -> Result<StatusSnapshot, StatusError> {
    let doc = session
        .call(METHOD_STATUS, None)
        .await?
        .ok_or(StatusError::Unavailable)?;

    let snapshot = StatusSnapshot::from_document(&doc, endpoint, extractor)?;
    debug!(
        extractor = extractor.name(),
        first_hops = ?snapshot.first_hops,
        "parsed status document"
    );
    info!(
        endpoint,
        interface = %snapshot.interface,
        hops = snapshot.first_hops.len(),
        "resolved daemon status"
    );
    Ok(snapshot)
}
