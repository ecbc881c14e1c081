// crates/meas-store-core/src/core/keywords.rs
// ============================================================================
// Module: Run Keywords
// Description: Search keywords derived from channel labels.
// Purpose: Give catalog listings a compact description of what was measured.
// Dependencies: crate::core::channel
// ============================================================================

//! ## Overview
//! Keywords list setpoint labels first (most recently introduced first) and
//! then measured labels in order of first appearance. Each label appears once.

use crate::core::channel::Channel;

/// Derives catalog keywords from the channels of a run.
#[must_use]
pub fn derive_keywords(channels: &[Channel]) -> Vec<String> {
    let mut setpoints: Vec<&str> = Vec::new();
    let mut measured: Vec<&str> = Vec::new();
    for channel in channels {
        let bucket = if channel.is_setpoint() { &mut setpoints } else { &mut measured };
        let label = channel.display_label();
        if !bucket.contains(&label) {
            bucket.push(label);
        }
    }
    setpoints.iter().rev().chain(measured.iter()).map(|label| (*label).to_string()).collect()
}
