//! Fuzz target for the client configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text through `ClientConfig::parse()`, covering both TOML
//! decoding and the validation rules for URLs, levels and styles.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = overlayctl_config::ClientConfig::parse(s) {
            // anything that parsed must also pass validation on its own
            assert!(config.validate().is_ok());
        }
    }
});
