#![deny(unsafe_code)]

//! Shared test utilities for the overlayctl workspace.
//!
//! - [`mock::MockTransport`] scripts connect outcomes and RPC replies and
//!   records every call, for controller tests that must count requests.
//! - [`fake_daemon::FakeDaemon`] serves canned JSON over real HTTP so the
//!   HTTP transport can be tested end to end.
//! - [`status::StatusDocBuilder`] builds status documents.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! overlayctl-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fake_daemon;
pub mod mock;
pub mod status;
pub mod tracing_setup;
