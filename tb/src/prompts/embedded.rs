//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Microtask breakdown prompt (stage one)
pub const BREAKDOWN: &str = include_str!("../../prompts/breakdown.pmt");

/// Task/time JSON extraction prompt (stage two)
pub const EXTRACT: &str = include_str!("../../prompts/extract.pmt");

/// Re-ask prompt used when the extraction output does not decode
pub const CORRECTION: &str = include_str!("../../prompts/correction.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "breakdown" => Some(BREAKDOWN),
        "extract" => Some(EXTRACT),
        "correction" => Some(CORRECTION),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}
