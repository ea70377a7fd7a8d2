//! Fuzz target for status document resolution.
//!
//! Run with: cargo +nightly fuzz run fuzz_status_resolve
//!
//! Arbitrary JSON is walked with both interface extractors. Resolution may
//! fail, but must never panic, and every failure must carry a `$`-rooted path.

#![no_main]

use libfuzzer_sys::fuzz_target;
use overlayctl_core::status::{IfaddrExtractor, IfnameExtractor, InterfaceExtractor};
use overlayctl_core::StatusSnapshot;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = serde_json::from_slice::<Value>(data) else {
        return;
    };

    let extractors: [&dyn InterfaceExtractor; 2] = [&IfnameExtractor, &IfaddrExtractor];
    for extractor in extractors {
        match StatusSnapshot::from_document(&doc, "default", extractor) {
            Ok(snapshot) => {
                assert!(snapshot.first_hops.iter().all(|hop| !hop.contains(':')));
            }
            Err(e) => assert!(e.path.starts_with('$')),
        }
    }
});
