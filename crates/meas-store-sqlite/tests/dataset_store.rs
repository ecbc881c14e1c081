// crates/meas-store-sqlite/tests/dataset_store.rs
// ============================================================================
// Module: SQLite Dataset Store Tests
// Description: Validate save/load/list behavior of the SQLite dataset store.
// Purpose: Ensure round-trips, filtered listings, and damage reporting.
// Dependencies: meas-store-sqlite, meas-store-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed dataset store. Exercises channel
//! round-trips, listing filters, partial-write visibility, and adversarial
//! storage conditions (dropped tables, damaged metadata, short blobs).

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use meas_store_core::Channel;
use meas_store_core::ChannelIdentity;
use meas_store_core::ParamId;
use meas_store_core::Run;
use meas_store_core::RunId;
use meas_store_core::RunQuery;
use meas_store_core::RunStore;
use meas_store_core::SampleInfo;
use meas_store_core::StoreError;
use meas_store_core::WriteMode;
use meas_store_sqlite::RunTableManager;
use meas_store_sqlite::SqliteDatasetStore;
use meas_store_sqlite::SqliteStoreConfig;
use meas_store_sqlite::SqliteStoreError;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn memory_store(mode: WriteMode) -> SqliteDatasetStore {
    SqliteDatasetStore::from_connection(Connection::open_in_memory().unwrap(), mode).unwrap()
}

fn sweep_run(setup: &str, start_time: i64) -> Run {
    Run::new("sweep", setup, "spin", "s1", start_time)
        .with_channel(Channel::new("x", "gate x", "mV", vec![0.0, 1.0, 2.0]))
        .with_channel(
            Channel::new("i", "current", "nA", vec![0.5, -1.25, 3.0]).with_dependency(["x"]),
        )
}

fn timed_run(start_time: i64, stop_time: i64) -> Run {
    sweep_run("A", start_time).with_stop_time(stop_time)
}

fn ids(store: &SqliteDatasetStore, query: &RunQuery) -> Vec<i64> {
    store.list(query).unwrap().into_iter().map(|summary| summary.run_id.get()).collect()
}

fn corrupt(store: &SqliteDatasetStore, sql: &str) {
    store
        .with_connection(|connection| {
            connection.execute_batch(sql).unwrap();
            Ok(())
        })
        .unwrap();
}

// ============================================================================
// SECTION: Round Trips
// ============================================================================

#[test]
fn save_then_load_reproduces_channels_in_order() {
    let store = memory_store(WriteMode::Lenient);
    let identity = ChannelIdentity {
        param_id: ParamId::new(11),
        set_index: 2,
        setpoint_param_id: Some(ParamId::new(10)),
        is_setpoint: false,
        is_local_setpoint: false,
        global_name: "dot1_current".to_string(),
    };
    let mut run = Run::new("charge stability", "XLD", "6dot", "S1", 1_700_000_000)
        .with_channel(Channel::new("p1", "plunger 1", "mV", vec![-1.0, 0.0]))
        .with_channel(Channel::new("p2", "plunger 2", "mV", vec![5.0, 6.0, 7.0]))
        .with_channel(
            Channel::new("sd", "sensor", "nA", (0 .. 6).map(f64::from).collect())
                .with_dependency(["p1", "p2"])
                .with_shape(vec![2, 3])
                .with_identity(identity),
        )
        .with_channel(Channel::new("empty", "", "", Vec::new()));
    run.snapshot = Some(r#"{"instrument":"ivvi"}"#.to_string());
    run.metadata = Some("free text".to_string());

    let report = store.save(&run).unwrap();
    assert!(report.upload_complete);
    assert_eq!(report.written, vec![0, 1, 2, 3]);
    assert!(report.failed.is_empty());
    assert_eq!(report.data_size, 8 * 11);
    assert!(report.table_name.starts_with(&format!("run_{}_", report.run_id)));

    let loaded = store.load(report.run_id).unwrap();
    assert_eq!(loaded.run_id, Some(report.run_id));
    assert_eq!(loaded.table_name.as_deref(), Some(report.table_name.as_str()));
    assert_eq!(loaded.channels, run.channels);
    assert_eq!(loaded.name, run.name);
    assert_eq!(loaded.setup, "XLD");
    assert_eq!(loaded.start_time, 1_700_000_000);
    assert_eq!(loaded.stop_time, None);
    assert_eq!(loaded.snapshot, run.snapshot);
    assert_eq!(loaded.metadata, run.metadata);
    assert!(loaded.upload_complete);
}

#[test]
fn payload_bits_survive_round_trip() {
    let store = memory_store(WriteMode::Lenient);
    let samples = vec![f64::NAN, -0.0, f64::INFINITY, f64::MIN_POSITIVE, 1e300];
    let run = Run::new("bits", "A", "p", "s", 1).with_channel(Channel::new("v", "", "", samples));
    let report = store.save(&run).unwrap();
    let loaded = store.load(report.run_id).unwrap();
    let expected: Vec<u64> = run.channels[0].payload.iter().map(|value| value.to_bits()).collect();
    let actual: Vec<u64> = loaded.channels[0].payload.iter().map(|value| value.to_bits()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn keywords_are_derived_on_save() {
    let store = memory_store(WriteMode::Lenient);
    let report = store.save(&sweep_run("A", 10)).unwrap();
    let loaded = store.load(report.run_id).unwrap();
    assert_eq!(loaded.keywords, vec!["gate x", "current"]);
    let record = store.catalog_entry(report.run_id).unwrap();
    assert_eq!(record.keywords, loaded.keywords);
    assert_eq!(record.data_size, 48);
}

#[test]
fn file_backed_store_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("nested").join("runs.db"));
    let run_id = {
        let store = SqliteDatasetStore::new(&config).unwrap();
        store.save(&sweep_run("A", 10)).unwrap().run_id
    };
    let reopened = SqliteDatasetStore::new(&config).unwrap();
    assert!(reopened.exists(run_id).unwrap());
    assert_eq!(reopened.load(run_id).unwrap().channels.len(), 2);
}

// ============================================================================
// SECTION: Listings
// ============================================================================

#[test]
fn list_orders_by_id_descending_and_applies_limit() {
    let store = memory_store(WriteMode::Lenient);
    let saved: Vec<i64> =
        (0 .. 4).map(|n| store.save(&sweep_run("A", n)).unwrap().run_id.get()).collect();
    let mut newest_first = saved.clone();
    newest_first.reverse();

    assert_eq!(ids(&store, &RunQuery::all()), newest_first);
    assert_eq!(ids(&store, &RunQuery::all().with_limit(0)), newest_first);
    assert_eq!(ids(&store, &RunQuery::all().with_limit(2)), newest_first[.. 2].to_vec());
    assert_eq!(ids(&store, &RunQuery::all().with_limit(10)).len(), 4);
}

#[test]
fn provenance_filters_restrict_results() {
    let store = memory_store(WriteMode::Lenient);
    let a1 = store.save(&sweep_run("A", 1)).unwrap().run_id.get();
    let b1 = store.save(&sweep_run("B", 2)).unwrap().run_id.get();
    let a2 = store.save(&sweep_run("A", 3)).unwrap().run_id.get();

    assert_eq!(ids(&store, &RunQuery::all().with_setup("A")), vec![a2, a1]);
    assert_eq!(ids(&store, &RunQuery::all().with_setup("B")), vec![b1]);
    assert_eq!(ids(&store, &RunQuery::all().with_setup("")), vec![a2, b1, a1]);
    assert!(ids(&store, &RunQuery::all().with_setup("A").with_sample("other")).is_empty());
}

#[test]
fn time_filters_follow_single_bound_rules() {
    let store = memory_store(WriteMode::Lenient);
    let first = store.save(&timed_run(100, 200)).unwrap().run_id.get();
    let second = store.save(&timed_run(300, 400)).unwrap().run_id.get();
    let third = store.save(&timed_run(500, 600)).unwrap().run_id.get();

    assert_eq!(ids(&store, &RunQuery::all().with_time_range(0, 250)), vec![first]);
    assert_eq!(ids(&store, &RunQuery::all().with_time_range(450, 0)), vec![third]);
    assert_eq!(ids(&store, &RunQuery::all().with_time_range(250, 0)), vec![third, second]);
    assert_eq!(ids(&store, &RunQuery::all().with_time_range(0, 0)), vec![third, second, first]);
    assert_eq!(ids(&store, &RunQuery::all().with_time_range(100, 400)), vec![second, first]);
}

#[test]
fn open_ended_runs_are_excluded_by_stop_bounds() {
    let store = memory_store(WriteMode::Lenient);
    let open = store.save(&sweep_run("A", 100)).unwrap().run_id;
    assert!(ids(&store, &RunQuery::all().with_time_range(0, 1_000)).is_empty());
    store.finish(open, 150).unwrap();
    assert_eq!(ids(&store, &RunQuery::all().with_time_range(0, 1_000)), vec![open.get()]);
    assert_eq!(store.load(open).unwrap().stop_time, Some(150));
}

#[test]
fn hostile_provenance_is_stored_verbatim() {
    let store = memory_store(WriteMode::Lenient);
    let hostile = "A'; DROP TABLE measurements_overview; --";
    let report = store.save(&sweep_run(hostile, 1)).unwrap();
    assert_eq!(ids(&store, &RunQuery::all().with_setup(hostile)), vec![report.run_id.get()]);
    assert_eq!(store.load(report.run_id).unwrap().setup, hostile);
    assert!(report.table_name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'));
}

#[test]
fn starred_flag_and_samples_are_tracked() {
    let store = memory_store(WriteMode::Lenient);
    let first = store.save(&sweep_run("B", 1)).unwrap().run_id;
    let second = store.save(&sweep_run("A", 2)).unwrap().run_id;
    store.save(&sweep_run("A", 3)).unwrap();

    store.set_starred(first, true).unwrap();
    assert_eq!(ids(&store, &RunQuery::all().starred()), vec![first.get()]);
    store.set_starred(first, false).unwrap();
    assert!(ids(&store, &RunQuery::all().starred()).is_empty());
    assert!(!store.load(second).unwrap().starred);

    let expected = vec![
        SampleInfo {
            setup: "A".to_string(),
            project: "spin".to_string(),
            sample: "s1".to_string(),
        },
        SampleInfo {
            setup: "B".to_string(),
            project: "spin".to_string(),
            sample: "s1".to_string(),
        },
    ];
    assert_eq!(store.samples().unwrap(), expected);
}

// ============================================================================
// SECTION: Failure Modes
// ============================================================================

#[test]
fn missing_run_is_not_found() {
    let store = memory_store(WriteMode::Lenient);
    assert_eq!(store.load(RunId::new(42)), Err(StoreError::NotFound(RunId::new(42))));
    assert!(!store.exists(RunId::new(42)).unwrap());
    assert!(matches!(store.finish(RunId::new(42), 1), Err(SqliteStoreError::NotFound(_))));
    assert!(matches!(store.set_starred(RunId::new(42), true), Err(SqliteStoreError::NotFound(_))));
}

#[test]
fn empty_provenance_is_rejected() {
    let store = memory_store(WriteMode::Lenient);
    let run = Run::new("sweep", "A", "", "s1", 1);
    assert!(matches!(store.save(&run), Err(StoreError::Invalid(_))));
    assert!(store.list(&RunQuery::all()).unwrap().is_empty());
}

#[test]
fn failed_channel_leaves_other_channels_readable() {
    let store = memory_store(WriteMode::Lenient);
    let run = Run::new("partial", "A", "p", "s", 1)
        .with_channel(Channel::new("a", "", "", vec![1.0, 2.0]))
        .with_channel(Channel::new("b", "", "", vec![1.0, 2.0, 3.0]).with_shape(vec![2, 2]))
        .with_channel(Channel::new("c", "", "", vec![4.0]).with_dependency(["a"]));

    let report = store.save(&run).unwrap();
    assert!(!report.upload_complete);
    assert_eq!(report.written, vec![0, 2]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 1);

    let loaded = store.load(report.run_id).unwrap();
    assert!(!loaded.upload_complete);
    let names: Vec<&str> = loaded.channels.iter().map(|channel| channel.name.as_str()).collect();
    assert_eq!(names, vec!["a", "c"]);
    assert_eq!(loaded.channels[1].payload, vec![4.0]);
}

#[test]
fn strict_mode_aborts_remaining_writes() {
    let store = memory_store(WriteMode::Strict);
    let run = Run::new("strict", "A", "p", "s", 1)
        .with_channel(Channel::new("a", "", "", vec![1.0]))
        .with_channel(Channel::new("b", "", "", vec![1.0, 2.0]).with_shape(vec![3]))
        .with_channel(Channel::new("c", "", "", vec![4.0]));

    let err = store.save(&run).unwrap_err();
    let StoreError::SaveAborted {
        run_id,
        table_name,
        index,
        message,
    } = err
    else {
        panic!("expected aborted save");
    };
    assert_eq!(index, 1);
    assert!(!message.contains("write failed"));

    let record = store.catalog_entry(run_id).unwrap();
    assert_eq!(record.table_name, table_name);
    assert!(!record.summary.upload_complete);
    let loaded = store.load(run_id).unwrap();
    assert_eq!(loaded.channels.len(), 1);
    assert_eq!(loaded.channels[0].name, "a");
}

#[test]
fn failure_reason_is_not_prefixed_twice() {
    let store = memory_store(WriteMode::Lenient);
    let run = Run::new("partial", "A", "p", "s", 1)
        .with_channel(Channel::new("b", "", "", vec![1.0, 2.0]).with_shape(vec![3]));

    let report = store.save(&run).unwrap();
    assert_eq!(report.failed.len(), 1);
    let reason = &report.failed[0].reason;
    assert_eq!(reason, "payload holds 2 samples, declared 3");
}

#[test]
fn repeated_channel_name_is_a_channel_failure() {
    let store = memory_store(WriteMode::Lenient);
    let run = Run::new("dup", "A", "p", "s", 1)
        .with_channel(Channel::new("x", "", "", vec![1.0]))
        .with_channel(Channel::new("x", "", "", vec![2.0]))
        .with_channel(Channel::new("y", "", "", vec![3.0]).with_dependency(["x"]));

    let report = store.save(&run).unwrap();
    assert!(!report.upload_complete);
    assert_eq!(report.written, vec![0, 2]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].index, 1);
    assert!(report.failed[0].reason.contains("duplicate channel name `x`"));

    let loaded = store.load(report.run_id).unwrap();
    let names: Vec<&str> = loaded.channels.iter().map(|channel| channel.name.as_str()).collect();
    assert_eq!(names, vec!["x", "y"]);
    assert_eq!(loaded.channel("x").unwrap().payload, vec![1.0]);
}

#[test]
fn repeated_channel_name_aborts_strict_save() {
    let store = memory_store(WriteMode::Strict);
    let run = Run::new("dup", "A", "p", "s", 1)
        .with_channel(Channel::new("x", "", "", vec![1.0]))
        .with_channel(Channel::new("x", "", "", vec![2.0]));

    let err = store.save(&run).unwrap_err();
    assert!(matches!(
        err,
        StoreError::SaveAborted {
            index: 1,
            ..
        }
    ));
}

#[test]
fn dropped_table_is_a_corrupt_catalog() {
    let store = memory_store(WriteMode::Lenient);
    let report = store.save(&sweep_run("A", 1)).unwrap();
    corrupt(&store, &format!("DROP TABLE \"{}\";", report.table_name));
    assert!(matches!(store.load(report.run_id), Err(StoreError::CorruptCatalog(_))));
}

#[test]
fn damaged_shape_text_is_malformed_metadata() {
    let store = memory_store(WriteMode::Lenient);
    let report = store.save(&sweep_run("A", 1)).unwrap();
    corrupt(&store, &format!("UPDATE \"{}\" SET shape = '3]' WHERE id = 1;", report.table_name));

    let err = store.load(report.run_id).unwrap_err();
    assert!(matches!(
        err,
        StoreError::MalformedMetadata {
            row: 1,
            ..
        }
    ));

    let partial = store.load_partial(report.run_id).unwrap();
    assert_eq!(partial.run.channels.len(), 1);
    assert_eq!(partial.run.channels[0].name, "x");
    assert_eq!(partial.faults.len(), 1);
}

#[test]
fn short_blob_is_a_truncated_payload() {
    let store = memory_store(WriteMode::Lenient);
    let report = store.save(&sweep_run("A", 1)).unwrap();
    corrupt(
        &store,
        &format!("UPDATE \"{}\" SET rawdata = zeroblob(16) WHERE id = 0;", report.table_name),
    );
    let err = store.load(report.run_id).unwrap_err();
    assert!(matches!(
        err,
        StoreError::TruncatedPayload {
            row: 0,
            ..
        }
    ));
}

#[test]
fn creating_an_existing_table_conflicts() {
    let store = memory_store(WriteMode::Lenient);
    let report = store.save(&sweep_run("A", 1)).unwrap();
    let result = store.with_connection(|connection| {
        RunTableManager::new(connection).create_table(&report.table_name)
    });
    assert!(matches!(result, Err(SqliteStoreError::Conflict(_))));
}

#[test]
fn unknown_schema_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("runs.db"));
    drop(SqliteDatasetStore::new(&config).unwrap());
    let connection = Connection::open(&config.path).unwrap();
    connection.execute("UPDATE store_meta SET version = ?1", params![99]).unwrap();
    drop(connection);
    assert!(matches!(
        SqliteDatasetStore::new(&config),
        Err(SqliteStoreError::VersionMismatch(_))
    ));
}

#[test]
fn non_database_file_is_a_lost_connection() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runs.db");
    std::fs::write(&path, vec![b'x'; 4096]).unwrap();
    let result = SqliteDatasetStore::new(&SqliteStoreConfig::new(path));
    assert!(matches!(result, Err(SqliteStoreError::ConnectionLost(_))));
}
