// crates/meas-store-core/src/core/mod.rs
// ============================================================================
// Module: Measurement Store Core Types
// Description: Canonical run, channel, and catalog projection structures.
// Purpose: Provide stable, serializable types shared by every store backend.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types describe what a measurement run is: provenance, time range, and
//! an ordered list of channels with shape/dependency metadata and flat `f64`
//! payloads. They carry no storage behavior.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod channel;
pub mod identifiers;
pub mod keywords;
pub mod query;
pub mod run;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use channel::Channel;
pub use channel::ChannelIdentity;
pub use channel::ChannelIntegrityError;
pub use identifiers::ParamId;
pub use identifiers::RunId;
pub use keywords::derive_keywords;
pub use query::RunQuery;
pub use query::TimeFilter;
pub use query::TimeRange;
pub use run::Run;
pub use run::RunSummary;
pub use run::SampleInfo;
