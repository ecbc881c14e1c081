// crates/meas-store-core/src/interfaces/mod.rs
// ============================================================================
// Module: Measurement Store Interfaces
// Description: Backend-agnostic persistence interface for measurement runs.
// Purpose: Define the save/load/list contract and its error taxonomy.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! [`RunStore`] is the seam between producers/consumers of runs and a
//! relational backend. Every failure is an explicit [`StoreError`] variant;
//! a missing run is [`StoreError::NotFound`], never an empty placeholder.
//! Saving favors visibility of partial progress: a failed channel write is
//! reported in [`SaveReport`] and the rows written so far stay readable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::Run;
use crate::core::RunId;
use crate::core::RunQuery;
use crate::core::RunSummary;

// ============================================================================
// SECTION: Save Outcome
// ============================================================================

/// Channel write policy for a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Attempt every channel and report failures individually.
    #[default]
    Lenient,
    /// Abort remaining channel writes after the first failure.
    Strict,
}

/// Failed write of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFailure {
    /// Positional index of the channel within its run.
    pub index: usize,
    /// Failure description.
    pub reason: String,
}

/// Outcome of saving a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// Catalog-assigned identifier.
    pub run_id: RunId,
    /// Derived per-run table name.
    pub table_name: String,
    /// Indices of channels written successfully.
    pub written: Vec<usize>,
    /// Channels that failed to write.
    pub failed: Vec<ChannelFailure>,
    /// Whether every channel was written.
    pub upload_complete: bool,
    /// Total packed payload bytes written.
    pub data_size: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Measurement store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transport failure on the underlying connection.
    #[error("measurement store connection lost: {0}")]
    ConnectionLost(String),
    /// No run with the given identifier exists.
    #[error("run {0} not found")]
    NotFound(RunId),
    /// Channel metadata of a stored row failed to decode.
    #[error("malformed metadata in {table} row {row}: {message}")]
    MalformedMetadata {
        /// Per-run table name.
        table: String,
        /// Positional index of the offending row.
        row: i64,
        /// Decoding failure description.
        message: String,
    },
    /// Stored payload does not match its declared sample count.
    #[error("truncated payload in {table} row {row}: {message}")]
    TruncatedPayload {
        /// Per-run table name.
        table: String,
        /// Positional index of the offending row.
        row: i64,
        /// Decoding failure description.
        message: String,
    },
    /// Catalog references a table that does not exist.
    #[error("corrupt catalog: {0}")]
    CorruptCatalog(String),
    /// A channel row could not be written.
    #[error("channel {index} write failed: {message}")]
    ChannelWrite {
        /// Positional index of the channel.
        index: usize,
        /// Failure description.
        message: String,
    },
    /// A strict-mode save stopped at a failed channel.
    ///
    /// The run stays registered with the rows written before the failure.
    #[error("run {run_id} save aborted at channel {index} in {table_name}: {message}")]
    SaveAborted {
        /// Identifier of the registered run.
        run_id: RunId,
        /// Per-run table holding the rows already written.
        table_name: String,
        /// Positional index of the failed channel.
        index: usize,
        /// Failure description.
        message: String,
    },
    /// Object already exists.
    #[error("measurement store conflict: {0}")]
    Conflict(String),
    /// Input was rejected.
    #[error("measurement store invalid data: {0}")]
    Invalid(String),
    /// Stored schema version is incompatible.
    #[error("measurement store version mismatch: {0}")]
    VersionMismatch(String),
    /// Local I/O error.
    #[error("measurement store io error: {0}")]
    Io(String),
    /// Backend reported an error.
    #[error("measurement store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Persistence backend for measurement runs.
pub trait RunStore {
    /// Registers a run and writes its channels.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when registration or table creation fails, or
    /// when a channel fails under [`WriteMode::Strict`].
    fn save(&self, run: &Run) -> Result<SaveReport, StoreError>;

    /// Fully materializes one run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown identifiers and decoding
    /// errors for damaged rows.
    fn load(&self, run_id: RunId) -> Result<Run, StoreError>;

    /// Lists catalog rows, most recent registration first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog query fails.
    fn list(&self, query: &RunQuery) -> Result<Vec<RunSummary>, StoreError>;
}
