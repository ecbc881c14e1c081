// crates/meas-store-core/src/lib.rs
// ============================================================================
// Module: Measurement Store Core Library
// Description: Public API surface for the measurement store core.
// Purpose: Expose run/channel types, metadata codec, payload packing, and interfaces.
// Dependencies: crate::{core, codec, packing, interfaces}
// ============================================================================

//! ## Overview
//! The measurement store core describes scientific measurement runs (a bundle
//! of named numeric channels plus run-level provenance) independently of any
//! relational backend. Backends plug in through the [`RunStore`] interface;
//! the textual metadata codec and binary payload packer live here so every
//! backend agrees on the on-disk encoding.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod codec;
pub mod core;
pub mod interfaces;
pub mod packing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use codec::MetadataError;
pub use interfaces::ChannelFailure;
pub use interfaces::RunStore;
pub use interfaces::SaveReport;
pub use interfaces::StoreError;
pub use interfaces::WriteMode;
pub use packing::PayloadError;
