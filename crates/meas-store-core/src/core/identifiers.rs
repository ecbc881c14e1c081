// crates/meas-store-core/src/core/identifiers.rs
// ============================================================================
// Module: Measurement Store Identifiers
// Description: Numeric identifiers for runs and physical parameters.
// Purpose: Provide strongly typed, serializable IDs with stable display forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Run identifiers are assigned by the catalog on registration and never by
//! callers. Parameter identifiers name a physical parameter process-wide and
//! are used as non-owning lookup keys between channels.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Catalog-assigned run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    /// Wraps a raw catalog identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for RunId {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

/// Process-wide identity of a physical parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamId(i64);

impl ParamId {
    /// Wraps a raw parameter identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<i64> for ParamId {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}
