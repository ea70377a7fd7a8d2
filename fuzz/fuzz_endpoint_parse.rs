//! Fuzz target for control endpoint URLs.
//!
//! Run with: cargo +nightly fuzz run fuzz_endpoint_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use overlayctl_core::Endpoint;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(endpoint) = s.parse::<Endpoint>() {
            // Display output parses back to the same endpoint
            let again: Endpoint = endpoint.to_string().parse().expect("display must reparse");
            assert_eq!(again, endpoint);
        }
    }
});
