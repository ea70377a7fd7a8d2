//! Build-time metadata embedded by the build script.
//!
//! Surfaces in `--version` output and in the first debug line of every run,
//! so a bug report always names the exact client build.

/// The git commit hash at build time (short form).
pub const GIT_HASH: &str = env!("OVERLAYCTL_GIT_HASH");

/// The build timestamp as a Unix epoch string.
pub const BUILD_TIMESTAMP: &str = env!("OVERLAYCTL_BUILD_TIMESTAMP");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("OVERLAYCTL_BUILD_PROFILE");

/// The crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Return a formatted version string including git hash and profile.
///
/// Example: `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}
