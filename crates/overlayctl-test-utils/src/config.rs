//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`ClientConfig`] values,
//! and [`TestConfigFile`] when the code under test reads from disk.

use std::path::{Path, PathBuf};

use overlayctl_config::ClientConfig;
use tempfile::TempDir;

/// Fluent builder for [`ClientConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .rpc_url(daemon.url())
///     .exit_address("exit.example")
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: ClientConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn rpc_url(mut self, url: &str) -> Self {
        self.config.rpc.url = url.to_string();
        self
    }

    pub fn endpoint(mut self, name: &str) -> Self {
        self.config.rpc.endpoint = name.to_string();
        self
    }

    pub fn timeouts(mut self, connect_secs: u64, call_secs: u64) -> Self {
        self.config.rpc.connect_timeout_secs = connect_secs;
        self.config.rpc.call_timeout_secs = call_secs;
        self
    }

    pub fn exit_address(mut self, addr: &str) -> Self {
        self.config.exit.address = Some(addr.to_string());
        self
    }

    pub fn exit_token(mut self, token: &str) -> Self {
        self.config.exit.token = Some(token.to_string());
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A TOML config file in a temp directory, deleted on drop.
pub struct TestConfigFile {
    path: PathBuf,
    _temp_dir: TempDir,
}

impl TestConfigFile {
    pub async fn with_toml(toml_content: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let path = temp_dir.path().join("overlayctl.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
