// crates/meas-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Measurement Store
// Description: Relational RunStore backend over SQLite.
// Purpose: Persist measurement runs as a catalog row plus one table per run.
// Dependencies: meas-store-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`meas_store_core::RunStore`]. The
//! catalog table lists every run; each run's channels live in their own table
//! named from the run identifier and slugged provenance. Channel metadata is
//! stored in the core codec's text form and payloads as packed little-endian
//! blobs. Security posture: every value is bound as a statement parameter and
//! table names are re-validated before use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod config;
pub mod naming;
pub mod store;
pub mod tables;

#[cfg(test)]
mod catalog_tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::CATALOG_TABLE;
pub use catalog::CatalogRecord;
pub use catalog::RunCatalog;
pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::SqliteStoreConfig;
pub use config::SqliteStoreMode;
pub use config::SqliteSyncMode;
pub use config::StoreSettings;
pub use naming::derive_table_name;
pub use naming::validate_table_name;
pub use store::PartialRun;
pub use store::SqliteDatasetStore;
pub use store::SqliteStoreError;
pub use tables::ChannelWriteOutcome;
pub use tables::RunTableManager;
