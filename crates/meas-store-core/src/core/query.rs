// crates/meas-store-core/src/core/query.rs
// ============================================================================
// Module: Run Listing Queries
// Description: Filter, time-range, and limit parameters for catalog listings.
// Purpose: Describe listing intent independently of the SQL that serves it.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`RunQuery`] captures a filtered catalog listing. Provenance filters apply
//! only when non-empty. A zero time bound means "unbounded" on that side, and
//! [`TimeRange::filter`] resolves the pair into one of four [`TimeFilter`]
//! cases. A zero `limit` returns every matching row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Time Range
// ============================================================================

/// Pair of unix-second bounds where zero means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Lower bound on start time (0 = none).
    pub start: i64,
    /// Upper bound on stop time (0 = none).
    pub stop: i64,
}

/// Resolved time filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFilter {
    /// No time restriction.
    Unbounded,
    /// Rows whose stop time is at or before the bound.
    StopAtOrBefore(i64),
    /// Rows whose start time is at or after the bound.
    StartAtOrAfter(i64),
    /// Rows starting at or after `start` and stopping at or before `stop`.
    Within {
        /// Lower bound on start time.
        start: i64,
        /// Upper bound on stop time.
        stop: i64,
    },
}

impl TimeRange {
    /// Creates a time range from raw bounds.
    #[must_use]
    pub const fn new(start: i64, stop: i64) -> Self {
        Self {
            start,
            stop,
        }
    }

    /// Resolves the bounds into a filter case.
    #[must_use]
    pub const fn filter(self) -> TimeFilter {
        match (self.start, self.stop) {
            (0, 0) => TimeFilter::Unbounded,
            (0, stop) => TimeFilter::StopAtOrBefore(stop),
            (start, 0) => TimeFilter::StartAtOrAfter(start),
            (start, stop) => TimeFilter::Within {
                start,
                stop,
            },
        }
    }
}

// ============================================================================
// SECTION: Run Query
// ============================================================================

/// Filtered, ordered, limited catalog listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunQuery {
    /// Maximum number of rows (0 = unbounded).
    #[serde(default)]
    pub limit: usize,
    /// Time bounds.
    #[serde(default)]
    pub time_range: TimeRange,
    /// Setup equality filter.
    #[serde(default)]
    pub setup: Option<String>,
    /// Project equality filter.
    #[serde(default)]
    pub project: Option<String>,
    /// Sample equality filter.
    #[serde(default)]
    pub sample: Option<String>,
    /// Restrict to starred runs.
    #[serde(default)]
    pub starred_only: bool,
}

impl RunQuery {
    /// Returns a query matching every run.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Caps the number of returned rows.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Restricts by time bounds.
    #[must_use]
    pub const fn with_time_range(mut self, start: i64, stop: i64) -> Self {
        self.time_range = TimeRange::new(start, stop);
        self
    }

    /// Restricts to one setup.
    #[must_use]
    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.setup = Some(setup.into());
        self
    }

    /// Restricts to one project.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Restricts to one sample.
    #[must_use]
    pub fn with_sample(mut self, sample: impl Into<String>) -> Self {
        self.sample = Some(sample.into());
        self
    }

    /// Restricts to starred runs.
    #[must_use]
    pub const fn starred(mut self) -> Self {
        self.starred_only = true;
        self
    }

    /// Returns the active provenance filters as `(column, value)` pairs.
    ///
    /// Empty values are skipped so they never restrict the listing.
    #[must_use]
    pub fn provenance_filters(&self) -> Vec<(&'static str, &str)> {
        [("set_up", &self.setup), ("project", &self.project), ("sample", &self.sample)]
            .into_iter()
            .filter_map(|(column, value)| {
                value.as_deref().filter(|value| !value.is_empty()).map(|value| (column, value))
            })
            .collect()
    }
}
