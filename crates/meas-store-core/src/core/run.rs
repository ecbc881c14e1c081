// crates/meas-store-core/src/core/run.rs
// ============================================================================
// Module: Measurement Runs
// Description: Run bundles and their lightweight catalog projections.
// Purpose: Model a measurement session with provenance, time range, and channels.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Run`] is caller-owned before registration and again after retrieval.
//! `run_id` and `table_name` are absent until the catalog assigns them and
//! never change afterward. [`RunSummary`] is the listing projection that
//! avoids materializing channel data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::channel::Channel;
use crate::core::identifiers::RunId;

// ============================================================================
// SECTION: Run
// ============================================================================

/// One recorded measurement session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Catalog identifier, assigned on registration.
    #[serde(default)]
    pub run_id: Option<RunId>,
    /// Derived per-run table name, assigned on registration.
    #[serde(default)]
    pub table_name: Option<String>,
    /// Free-text run label.
    pub name: String,
    /// Setup the run was taken on.
    pub setup: String,
    /// Project the run belongs to.
    pub project: String,
    /// Sample under measurement.
    pub sample: String,
    /// Start time in unix seconds.
    pub start_time: i64,
    /// Stop time in unix seconds; absent while the run is open-ended.
    #[serde(default)]
    pub stop_time: Option<i64>,
    /// Channels in storage order.
    #[serde(default)]
    pub channels: Vec<Channel>,
    /// Opaque instrument configuration snapshot.
    #[serde(default)]
    pub snapshot: Option<String>,
    /// Opaque free-form metadata.
    #[serde(default)]
    pub metadata: Option<String>,
    /// Search keywords derived from channel labels.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// User bookmark flag.
    #[serde(default)]
    pub starred: bool,
    /// Whether the full write sequence finished.
    #[serde(default)]
    pub upload_complete: bool,
}

impl Run {
    /// Creates an unregistered run with no channels.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        setup: impl Into<String>,
        project: impl Into<String>,
        sample: impl Into<String>,
        start_time: i64,
    ) -> Self {
        Self {
            run_id: None,
            table_name: None,
            name: name.into(),
            setup: setup.into(),
            project: project.into(),
            sample: sample.into(),
            start_time,
            stop_time: None,
            channels: Vec::new(),
            snapshot: None,
            metadata: None,
            keywords: Vec::new(),
            starred: false,
            upload_complete: false,
        }
    }

    /// Appends a channel; its positional index is the current channel count.
    #[must_use]
    pub fn with_channel(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self
    }

    /// Sets the stop time.
    #[must_use]
    pub const fn with_stop_time(mut self, stop_time: i64) -> Self {
        self.stop_time = Some(stop_time);
        self
    }

    /// Looks up a channel by name.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.name == name)
    }

    /// Total packed payload size in bytes.
    #[must_use]
    pub fn payload_bytes(&self) -> usize {
        self.channels
            .iter()
            .map(|channel| channel.payload.len().saturating_mul(crate::packing::SAMPLE_BYTES))
            .fold(0usize, usize::saturating_add)
    }
}

// ============================================================================
// SECTION: Catalog Projections
// ============================================================================

/// Lightweight catalog row used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Catalog identifier.
    pub run_id: RunId,
    /// Free-text run label.
    pub name: String,
    /// Setup the run was taken on.
    pub setup: String,
    /// Project the run belongs to.
    pub project: String,
    /// Sample under measurement.
    pub sample: String,
    /// Start time in unix seconds.
    pub start_time: i64,
    /// Stop time in unix seconds, if the run has finished.
    pub stop_time: Option<i64>,
    /// User bookmark flag.
    pub starred: bool,
    /// Whether the full write sequence finished.
    pub upload_complete: bool,
}

/// Distinct provenance triple seen in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleInfo {
    /// Setup name.
    pub setup: String,
    /// Project name.
    pub project: String,
    /// Sample name.
    pub sample: String,
}
