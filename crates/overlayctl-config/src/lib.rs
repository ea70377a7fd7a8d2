#![deny(unsafe_code)]

//! Configuration loading and validation for overlayctl.
//!
//! Loads TOML configuration files and validates them. The [`ClientConfig`]
//! type carries the control-endpoint address, the exit defaults and the
//! logging settings; command-line flags are layered on top by the CLI.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default control endpoint of a locally running daemon.
pub const DEFAULT_RPC_URL: &str = "tcp://127.0.0.1:1190";

/// Name of the logical endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "default";

/// Address schemes understood by the transport.
pub const RPC_SCHEMES: [&str; 3] = ["tcp://", "ipc://", "unix://"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level client configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Control-endpoint connection settings.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Exit peer defaults.
    #[serde(default)]
    pub exit: ExitConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How to reach the daemon's control endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Control endpoint URL (`tcp://host:port` or `ipc:///path`).
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Logical endpoint whose interface is resolved from the status document.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Seconds to wait for the connection handshake (0 = wait forever).
    #[serde(default)]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for each RPC reply (0 = wait forever).
    #[serde(default)]
    pub call_timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            endpoint: default_endpoint(),
            connect_timeout_secs: 0,
            call_timeout_secs: 0,
        }
    }
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Exit peer defaults, overridable from the command line.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ExitConfig {
    /// Address of the exit peer to route through.
    #[serde(default)]
    pub address: Option<String>,

    /// Authentication token presented to the exit peer.
    #[serde(default)]
    pub token: Option<String>,
}

impl fmt::Debug for ExitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExitConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "warn", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line style: "auto" probes the terminal, "modern" or "legacy" force one.
    #[serde(default = "default_log_style")]
    pub style: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            style: default_log_style(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_style() -> String {
    "auto".to_string()
}

impl ClientConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.url.is_empty() {
            return Err(ConfigError::Validation(
                "rpc.url must not be empty".to_string(),
            ));
        }
        if !RPC_SCHEMES
            .iter()
            .any(|scheme| self.rpc.url.starts_with(scheme))
        {
            return Err(ConfigError::Validation(format!(
                "rpc.url must start with one of {:?}, got {:?}",
                RPC_SCHEMES, self.rpc.url
            )));
        }
        if self.rpc.endpoint.is_empty() {
            return Err(ConfigError::Validation(
                "rpc.endpoint must not be empty".to_string(),
            ));
        }
        if self.exit.address.as_deref() == Some("") {
            return Err(ConfigError::Validation(
                "exit.address must not be empty when set".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        let valid_styles = ["auto", "modern", "legacy"];
        if !valid_styles.contains(&self.logging.style.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.style must be one of {:?}, got {:?}",
                valid_styles, self.logging.style
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.rpc.url, "tcp://127.0.0.1:1190");
        assert_eq!(config.rpc.endpoint, "default");
        assert_eq!(config.rpc.connect_timeout_secs, 0);
        assert_eq!(config.logging.level, "warn");
        assert!(config.exit.address.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_empty_toml() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config.rpc.url, DEFAULT_RPC_URL);
        assert_eq!(config.logging.style, "auto");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [rpc]
            url = "ipc:///run/overlay/rpc.sock"
            endpoint = "tun0-service"
            connect_timeout_secs = 5
            call_timeout_secs = 10

            [exit]
            address = "exit.example"
            token = "hunter2"

            [logging]
            level = "debug"
            style = "legacy"
        "#;
        let config = ClientConfig::parse(toml).unwrap();
        assert_eq!(config.rpc.url, "ipc:///run/overlay/rpc.sock");
        assert_eq!(config.rpc.endpoint, "tun0-service");
        assert_eq!(config.rpc.connect_timeout_secs, 5);
        assert_eq!(config.rpc.call_timeout_secs, 10);
        assert_eq!(config.exit.address.as_deref(), Some("exit.example"));
        assert_eq!(config.exit.token.as_deref(), Some("hunter2"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.style, "legacy");
    }

    #[test]
    fn test_validation_rejects_unknown_scheme() {
        let toml = r#"
            [rpc]
            url = "http://127.0.0.1:1190"
        "#;
        let err = ClientConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("rpc.url"));
    }

    #[test]
    fn test_validation_rejects_empty_url() {
        let toml = r#"
            [rpc]
            url = ""
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_endpoint() {
        let toml = r#"
            [rpc]
            endpoint = ""
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_exit_address() {
        let toml = r#"
            [exit]
            address = ""
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_style() {
        let toml = r#"
            [logging]
            style = "fancy"
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_exit_token_redacted_in_debug() {
        let exit = ExitConfig {
            address: Some("exit.example".to_string()),
            token: Some("hunter2".to_string()),
        };
        let debug = format!("{exit:?}");
        assert!(debug.contains("exit.example"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("overlayctl.toml");
        tokio::fs::write(&path, b"[rpc]\nurl = \"tcp://10.0.0.2:1190\"\n")
            .await
            .unwrap();

        let config = ClientConfig::load(&path).await.unwrap();
        assert_eq!(config.rpc.url, "tcp://10.0.0.2:1190");
        assert_eq!(config.rpc.endpoint, "default");
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = ClientConfig::load(Path::new("/nonexistent/overlayctl.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = ClientConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
