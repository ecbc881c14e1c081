// crates/meas-store-sqlite/src/catalog_tests.rs
// ============================================================================
// Module: Catalog Query Construction Tests
// Description: Unit tests for listing statement construction.
// Purpose: Ensure filters compose in order and every value is bound.
// Dependencies: meas-store-sqlite catalog helpers
// ============================================================================

//! ## Overview
//! Validates `build_list_query` placeholder numbering, filter ordering, and
//! limit handling without touching a database.
//!
//! Security posture: filter values are untrusted; none may reach SQL text.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use meas_store_core::RunQuery;
use rusqlite::types::Value;

use crate::catalog::build_list_query;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn unfiltered_query_has_no_where_or_limit() {
    let (sql, values) = build_list_query(&RunQuery::all()).unwrap();
    assert!(!sql.contains("WHERE"));
    assert!(!sql.contains("LIMIT"));
    assert!(sql.ends_with("ORDER BY id DESC"));
    assert!(values.is_empty());
}

#[test]
fn filters_compose_in_order_with_numbered_placeholders() {
    let query = RunQuery::all()
        .with_setup("A")
        .with_sample("s1")
        .with_time_range(100, 400)
        .with_limit(7)
        .starred();
    let (sql, values) = build_list_query(&query).unwrap();
    assert!(sql.contains(
        "WHERE set_up = ?1 AND sample = ?2 AND start_time >= ?3 AND stop_time <= ?4 AND \
         starred = 1 ORDER BY id DESC LIMIT ?5"
    ));
    assert_eq!(
        values,
        vec![
            Value::Text("A".to_string()),
            Value::Text("s1".to_string()),
            Value::Integer(100),
            Value::Integer(400),
            Value::Integer(7),
        ]
    );
}

#[test]
fn single_bound_time_ranges_pick_one_column() {
    let (stop_sql, stop_values) =
        build_list_query(&RunQuery::all().with_time_range(0, 250)).unwrap();
    assert!(stop_sql.contains("WHERE stop_time <= ?1"));
    assert_eq!(stop_values, vec![Value::Integer(250)]);

    let (start_sql, start_values) =
        build_list_query(&RunQuery::all().with_time_range(450, 0)).unwrap();
    assert!(start_sql.contains("WHERE start_time >= ?1"));
    assert_eq!(start_values, vec![Value::Integer(450)]);
}

#[test]
fn filter_values_never_reach_sql_text() {
    let hostile = "x' OR '1'='1";
    let (sql, values) = build_list_query(&RunQuery::all().with_project(hostile)).unwrap();
    assert!(!sql.contains(hostile));
    assert_eq!(values, vec![Value::Text(hostile.to_string())]);
}
