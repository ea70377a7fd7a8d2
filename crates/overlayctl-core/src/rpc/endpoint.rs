//! Control-endpoint addresses.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Errors from parsing a control-endpoint URL.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("unsupported endpoint scheme in {0:?} (expected tcp://, ipc:// or unix://)")]
    Scheme(String),

    #[error("endpoint {0:?} is missing a port")]
    MissingPort(String),

    #[error("endpoint {url:?} has an invalid port: {port:?}")]
    InvalidPort { url: String, port: String },

    #[error("endpoint {0:?} has an empty host or path")]
    Empty(String),

    #[error("endpoint {0:?}: IPv6 hosts must be written as [addr]:port")]
    Unbracketed(String),
}

/// Where the daemon's control interface listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `tcp://host:port`
    Tcp { host: String, port: u16 },
    /// `ipc:///path/to/socket` (or `unix://`)
    Ipc(PathBuf),
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = url.strip_prefix("tcp://") {
            let (host, port) = match rest.strip_prefix('[') {
                Some(bracketed) => {
                    let (host, tail) = bracketed
                        .split_once(']')
                        .ok_or_else(|| EndpointError::Unbracketed(url.to_string()))?;
                    let port = tail
                        .strip_prefix(':')
                        .ok_or_else(|| EndpointError::MissingPort(url.to_string()))?;
                    (host, port)
                }
                None => {
                    let (host, port) = rest
                        .rsplit_once(':')
                        .ok_or_else(|| EndpointError::MissingPort(url.to_string()))?;
                    // `tcp://::1` would otherwise read as host ":" port 1
                    if host.contains(':') {
                        return Err(EndpointError::Unbracketed(url.to_string()));
                    }
                    (host, port)
                }
            };
            if host.is_empty() {
                return Err(EndpointError::Empty(url.to_string()));
            }
            let port = port.parse().map_err(|_| EndpointError::InvalidPort {
                url: url.to_string(),
                port: port.to_string(),
            })?;
            return Ok(Endpoint::Tcp {
                host: host.to_string(),
                port,
            });
        }

        let path = url
            .strip_prefix("ipc://")
            .or_else(|| url.strip_prefix("unix://"))
            .ok_or_else(|| EndpointError::Scheme(url.to_string()))?;
        if path.is_empty() {
            return Err(EndpointError::Empty(url.to_string()));
        }
        Ok(Endpoint::Ipc(PathBuf::from(path)))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') || host.starts_with('[') => {
                write!(f, "tcp://[{host}]:{port}")
            }
            Endpoint::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
        }
    }
}
