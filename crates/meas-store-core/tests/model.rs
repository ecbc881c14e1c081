// crates/meas-store-core/tests/model.rs
// ============================================================================
// Module: Core Model Tests
// Description: Channel integrity, listing query resolution, and keywords.
// Purpose: Pin down data-model invariants independent of any backend.
// ============================================================================

//! Unit tests for channels, runs, listing queries, and keyword derivation.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use meas_store_core::Channel;
use meas_store_core::ChannelIdentity;
use meas_store_core::ChannelIntegrityError;
use meas_store_core::ParamId;
use meas_store_core::Run;
use meas_store_core::RunQuery;
use meas_store_core::TimeFilter;
use meas_store_core::TimeRange;
use meas_store_core::derive_keywords;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn identity(param_id: i64, is_setpoint: bool) -> ChannelIdentity {
    ChannelIdentity {
        param_id: ParamId::new(param_id),
        set_index: 0,
        setpoint_param_id: None,
        is_setpoint,
        is_local_setpoint: false,
        global_name: format!("param_{param_id}"),
    }
}

// ============================================================================
// SECTION: Channels
// ============================================================================

#[test]
fn declared_len_is_shape_product() {
    let channel = Channel::new("i", "current", "A", vec![0.0; 6]).with_shape(vec![2, 3]);
    assert_eq!(channel.declared_len().unwrap(), 6);
    assert!(channel.validate().is_ok());
}

#[test]
fn explicit_size_applies_without_shape() {
    let mut channel = Channel::new("v", "voltage", "V", vec![1.0, 2.0, 3.0]).with_shape(Vec::new());
    channel.size = Some(3);
    assert_eq!(channel.declared_len().unwrap(), 3);
    assert!(channel.validate().is_ok());
}

#[test]
fn explicit_size_must_agree_with_shape() {
    let mut channel = Channel::new("v", "voltage", "V", vec![0.0; 4]).with_shape(vec![2, 2]);
    channel.size = Some(5);
    assert_eq!(
        channel.declared_len(),
        Err(ChannelIntegrityError::SizeShapeMismatch {
            size: 5,
            shape_product: 4,
        })
    );
}

#[test]
fn payload_length_mismatch_is_a_fault() {
    let channel = Channel::new("i", "current", "A", vec![0.0; 5]).with_shape(vec![2, 3]);
    assert_eq!(
        channel.validate(),
        Err(ChannelIntegrityError::LengthMismatch {
            declared: 6,
            actual: 5,
        })
    );
}

#[test]
fn zero_dimension_and_empty_name_are_rejected() {
    let channel = Channel::new("i", "current", "A", vec![1.0]).with_shape(vec![1, 0]);
    assert_eq!(
        channel.validate(),
        Err(ChannelIntegrityError::ZeroDimension {
            axis: 1
        })
    );
    let unnamed = Channel::new("", "current", "A", vec![1.0]);
    assert_eq!(unnamed.validate(), Err(ChannelIntegrityError::EmptyName));
}

#[test]
fn empty_payload_channel_is_valid() {
    let channel = Channel::new("empty", "", "", Vec::new());
    assert_eq!(channel.size, Some(0));
    assert!(channel.validate().is_ok());
}

#[test]
fn shape_overflow_is_detected() {
    let channel = Channel::new("huge", "", "", vec![1.0]).with_shape(vec![usize::MAX, 2]);
    assert_eq!(channel.declared_len(), Err(ChannelIntegrityError::CountOverflow));
}

#[test]
fn setpoint_classification_prefers_identity_flags() {
    let plain_setpoint = Channel::new("x", "gate", "mV", vec![1.0]);
    let plain_measured = Channel::new("y", "signal", "V", vec![1.0]).with_dependency(["x"]);
    let flagged = Channel::new("z", "", "V", vec![1.0]).with_identity(identity(7, false));
    assert!(plain_setpoint.is_setpoint());
    assert!(!plain_measured.is_setpoint());
    assert!(!flagged.is_setpoint());
}

// ============================================================================
// SECTION: Runs
// ============================================================================

#[test]
fn payload_bytes_sums_channels() {
    let run = Run::new("sweep", "fridge", "spin", "s1", 10)
        .with_channel(Channel::new("x", "", "", vec![0.0; 3]))
        .with_channel(Channel::new("y", "", "", vec![0.0; 2]).with_dependency(["x"]));
    assert_eq!(run.payload_bytes(), 40);
    assert_eq!(run.channel("y").map(|channel| channel.payload.len()), Some(2));
    assert!(run.channel("missing").is_none());
}

// ============================================================================
// SECTION: Queries
// ============================================================================

#[test]
fn time_range_resolves_four_cases() {
    assert_eq!(TimeRange::new(0, 0).filter(), TimeFilter::Unbounded);
    assert_eq!(TimeRange::new(0, 250).filter(), TimeFilter::StopAtOrBefore(250));
    assert_eq!(TimeRange::new(450, 0).filter(), TimeFilter::StartAtOrAfter(450));
    assert_eq!(
        TimeRange::new(100, 400).filter(),
        TimeFilter::Within {
            start: 100,
            stop: 400
        }
    );
}

#[test]
fn empty_provenance_filters_are_skipped() {
    let query = RunQuery::all().with_setup("A").with_project("").with_sample("s1");
    assert_eq!(query.provenance_filters(), vec![("set_up", "A"), ("sample", "s1")]);
    assert!(RunQuery::all().provenance_filters().is_empty());
}

#[test]
fn query_deserializes_with_defaults() {
    let query: RunQuery = serde_json::from_str(r#"{"limit": 5, "setup": "B"}"#).unwrap();
    assert_eq!(query, RunQuery::all().with_limit(5).with_setup("B"));
}

// ============================================================================
// SECTION: Keywords
// ============================================================================

#[test]
fn keywords_list_setpoints_reversed_then_measured() {
    let channels = vec![
        Channel::new("x", "gate x", "mV", vec![1.0]),
        Channel::new("y", "gate y", "mV", vec![1.0]),
        Channel::new("a", "signal", "V", vec![1.0]).with_dependency(["x", "y"]),
        Channel::new("b", "", "V", vec![1.0]).with_dependency(["x"]),
        Channel::new("c", "signal", "V", vec![1.0]).with_dependency(["x"]),
    ];
    assert_eq!(derive_keywords(&channels), vec!["gate y", "gate x", "signal", "b"]);
}
