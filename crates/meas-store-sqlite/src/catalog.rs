// crates/meas-store-sqlite/src/catalog.rs
// ============================================================================
// Module: Run Catalog
// Description: The single table indexing every run by identifier and provenance.
// Purpose: Register runs, resolve their tables, and serve filtered listings.
// Dependencies: meas-store-core, rusqlite, serde_json, tracing
// ============================================================================

//! ## Overview
//! The catalog (`measurements_overview`) holds one row per run. Registration
//! inserts the row and derives the per-run table name inside one transaction,
//! taking the identifier from `INSERT ... RETURNING id`, so concurrent writers
//! never observe each other's identifiers. Listings bind every filter value as
//! a statement parameter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use meas_store_core::Run;
use meas_store_core::RunId;
use meas_store_core::RunQuery;
use meas_store_core::RunSummary;
use meas_store_core::SampleInfo;
use meas_store_core::TimeFilter;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::naming::derive_table_name;
use crate::store::SqliteStoreError;
use crate::store::db_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the catalog.
const SCHEMA_VERSION: i64 = 1;
/// Catalog table name.
pub const CATALOG_TABLE: &str = "measurements_overview";
/// Column list shared by summary projections.
const SUMMARY_COLUMNS: &str =
    "id, exp_name, set_up, project, sample, start_time, stop_time, starred, completed";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Full catalog row for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    /// Listing projection.
    pub summary: RunSummary,
    /// Per-run table name.
    pub table_name: String,
    /// Opaque snapshot text.
    pub snapshot: Option<String>,
    /// Opaque metadata text.
    pub metadata: Option<String>,
    /// Derived keywords.
    pub keywords: Vec<String>,
    /// Total packed payload bytes written.
    pub data_size: u64,
}

/// Catalog operations over a borrowed connection.
pub struct RunCatalog<'conn> {
    /// Connection used for every statement.
    connection: &'conn Connection,
}

// ============================================================================
// SECTION: Catalog
// ============================================================================

impl<'conn> RunCatalog<'conn> {
    /// Wraps a connection.
    #[must_use]
    pub const fn new(connection: &'conn Connection) -> Self {
        Self {
            connection,
        }
    }

    /// Creates the catalog schema or validates the existing version.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::VersionMismatch`] for unknown schema
    /// versions and database errors otherwise.
    pub fn initialize(&self) -> Result<(), SqliteStoreError> {
        let tx = self.connection.unchecked_transaction().map_err(db_error)?;
        tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
            .map_err(db_error)?;
        let version: Option<i64> = tx
            .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        match version {
            None => {
                tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                    .map_err(db_error)?;
                tx.execute_batch(
                    "CREATE TABLE IF NOT EXISTS measurements_overview (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        set_up TEXT NOT NULL,
                        project TEXT NOT NULL,
                        sample TEXT NOT NULL,
                        exp_name TEXT NOT NULL,
                        start_time INTEGER NOT NULL,
                        stop_time INTEGER,
                        exp_data TEXT UNIQUE,
                        snapshot TEXT,
                        metadata TEXT,
                        keywords TEXT NOT NULL DEFAULT '[]',
                        starred INTEGER NOT NULL DEFAULT 0,
                        completed INTEGER NOT NULL DEFAULT 0,
                        data_size INTEGER NOT NULL DEFAULT 0
                    );
                    CREATE INDEX IF NOT EXISTS idx_overview_provenance
                        ON measurements_overview (project, set_up, sample);
                    CREATE INDEX IF NOT EXISTS idx_overview_starred
                        ON measurements_overview (starred);",
                )
                .map_err(db_error)?;
            }
            Some(value) if value == SCHEMA_VERSION => {}
            Some(value) => {
                return Err(SqliteStoreError::VersionMismatch(format!(
                    "unsupported schema version: {value}"
                )));
            }
        }
        tx.commit().map_err(db_error)?;
        Ok(())
    }

    /// Registers a run and returns its identifier and derived table name.
    ///
    /// The row starts with `completed = 0`; the table name is written in the
    /// same transaction as the insert.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when provenance or name is empty
    /// and database errors otherwise.
    pub fn register(
        &self,
        run: &Run,
        keywords: &[String],
    ) -> Result<(RunId, String), SqliteStoreError> {
        for (field, value) in [
            ("name", &run.name),
            ("setup", &run.setup),
            ("project", &run.project),
            ("sample", &run.sample),
        ] {
            if value.is_empty() {
                return Err(SqliteStoreError::Invalid(format!("run {field} must be non-empty")));
            }
        }
        let keywords = serde_json::to_string(keywords)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let tx = self.connection.unchecked_transaction().map_err(db_error)?;
        let id: i64 = tx
            .query_row(
                "INSERT INTO measurements_overview (set_up, project, sample, exp_name, \
                 start_time, stop_time, snapshot, metadata, keywords, starred) VALUES (?1, ?2, \
                 ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) RETURNING id",
                params![
                    run.setup,
                    run.project,
                    run.sample,
                    run.name,
                    run.start_time,
                    run.stop_time,
                    run.snapshot,
                    run.metadata,
                    keywords,
                    run.starred
                ],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        let run_id = RunId::new(id);
        let table_name = derive_table_name(run_id, &run.setup, &run.project, &run.sample);
        tx.execute(
            "UPDATE measurements_overview SET exp_data = ?1 WHERE id = ?2",
            params![table_name, id],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        tracing::info!(run_id = id, table = %table_name, "registered run");
        Ok((run_id, table_name))
    }

    /// Lists runs matching the query, most recent registration first.
    ///
    /// # Errors
    ///
    /// Returns database errors or [`SqliteStoreError::Corrupt`] for
    /// undecodable rows.
    pub fn list(&self, query: &RunQuery) -> Result<Vec<RunSummary>, SqliteStoreError> {
        let (sql, values) = build_list_query(query)?;
        tracing::debug!(sql = %sql, params = values.len(), "listing runs");
        let mut statement = self.connection.prepare(&sql).map_err(db_error)?;
        let rows = statement.query_map(params_from_iter(values.iter()), summary_from_row);
        let rows = rows.map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
    }

    /// Looks up one run.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] when the identifier is unknown
    /// and [`SqliteStoreError::Corrupt`] when the row lacks a table name or
    /// holds undecodable keywords.
    pub fn get(&self, run_id: RunId) -> Result<CatalogRecord, SqliteStoreError> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS}, exp_data, snapshot, metadata, keywords, data_size FROM \
             {CATALOG_TABLE} WHERE id = ?1"
        );
        let row = self
            .connection
            .query_row(&sql, params![run_id.get()], |row| {
                let summary = summary_from_row(row)?;
                let table_name: Option<String> = row.get(9)?;
                let snapshot: Option<String> = row.get(10)?;
                let metadata: Option<String> = row.get(11)?;
                let keywords: String = row.get(12)?;
                let data_size: i64 = row.get(13)?;
                Ok((summary, table_name, snapshot, metadata, keywords, data_size))
            })
            .optional()
            .map_err(db_error)?;
        let Some((summary, table_name, snapshot, metadata, keywords, data_size)) = row else {
            return Err(SqliteStoreError::NotFound(run_id));
        };
        let table_name = table_name.ok_or_else(|| {
            SqliteStoreError::Corrupt(format!("run {run_id} has no data table recorded"))
        })?;
        let keywords: Vec<String> = serde_json::from_str(&keywords).map_err(|err| {
            SqliteStoreError::Corrupt(format!("run {run_id} keywords undecodable: {err}"))
        })?;
        let data_size = u64::try_from(data_size).map_err(|_| {
            SqliteStoreError::Corrupt(format!("run {run_id} has negative data size"))
        })?;
        Ok(CatalogRecord {
            summary,
            table_name,
            snapshot,
            metadata,
            keywords,
            data_size,
        })
    }

    /// Returns true when a run with the identifier exists.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn exists(&self, run_id: RunId) -> Result<bool, SqliteStoreError> {
        let found: Option<i64> = self
            .connection
            .query_row(
                "SELECT id FROM measurements_overview WHERE id = ?1",
                params![run_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        Ok(found.is_some())
    }

    /// Records the stop time of a run.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] when the identifier is unknown.
    pub fn finish(&self, run_id: RunId, stop_time: i64) -> Result<(), SqliteStoreError> {
        self.update_one(
            run_id,
            "UPDATE measurements_overview SET stop_time = ?1 WHERE id = ?2",
            Value::Integer(stop_time),
        )
    }

    /// Sets or clears the starred flag.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] when the identifier is unknown.
    pub fn set_starred(&self, run_id: RunId, starred: bool) -> Result<(), SqliteStoreError> {
        self.update_one(
            run_id,
            "UPDATE measurements_overview SET starred = ?1 WHERE id = ?2",
            Value::Integer(i64::from(starred)),
        )
    }

    /// Records the outcome of the channel write sequence.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] when the identifier is unknown.
    pub fn mark_upload(
        &self,
        run_id: RunId,
        complete: bool,
        data_size: u64,
    ) -> Result<(), SqliteStoreError> {
        let data_size = i64::try_from(data_size)
            .map_err(|_| SqliteStoreError::Invalid("data size exceeds i64".to_string()))?;
        let changed = self
            .connection
            .execute(
                "UPDATE measurements_overview SET completed = ?1, data_size = ?2 WHERE id = ?3",
                params![complete, data_size, run_id.get()],
            )
            .map_err(db_error)?;
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(run_id));
        }
        Ok(())
    }

    /// Returns the distinct provenance triples in the catalog.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn samples(&self) -> Result<Vec<SampleInfo>, SqliteStoreError> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT DISTINCT set_up, project, sample FROM measurements_overview ORDER BY \
                 set_up, project, sample",
            )
            .map_err(db_error)?;
        let rows = statement
            .query_map(params![], |row| {
                Ok(SampleInfo {
                    setup: row.get(0)?,
                    project: row.get(1)?,
                    sample: row.get(2)?,
                })
            })
            .map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)
    }

    /// Runs a single-row update keyed by run id.
    fn update_one(&self, run_id: RunId, sql: &str, value: Value) -> Result<(), SqliteStoreError> {
        let changed =
            self.connection.execute(sql, params![value, run_id.get()]).map_err(db_error)?;
        if changed == 0 {
            return Err(SqliteStoreError::NotFound(run_id));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Query Construction
// ============================================================================

/// Builds the listing statement and its bound parameters.
///
/// Conditions are conjoined in order: provenance equality filters, the time
/// filter, then the starred flag. Rows are ordered by id descending and the
/// limit is bound as a parameter when positive.
pub(crate) fn build_list_query(
    query: &RunQuery,
) -> Result<(String, Vec<Value>), SqliteStoreError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (column, value) in query.provenance_filters() {
        push_condition(&mut conditions, &mut values, column, "=", Value::Text(value.to_string()));
    }
    match query.time_range.filter() {
        TimeFilter::Unbounded => {}
        TimeFilter::StopAtOrBefore(stop) => {
            push_condition(&mut conditions, &mut values, "stop_time", "<=", Value::Integer(stop));
        }
        TimeFilter::StartAtOrAfter(start) => {
            push_condition(&mut conditions, &mut values, "start_time", ">=", Value::Integer(start));
        }
        TimeFilter::Within {
            start,
            stop,
        } => {
            push_condition(&mut conditions, &mut values, "start_time", ">=", Value::Integer(start));
            push_condition(&mut conditions, &mut values, "stop_time", "<=", Value::Integer(stop));
        }
    }
    if query.starred_only {
        conditions.push("starred = 1".to_string());
    }
    let mut sql = format!("SELECT {SUMMARY_COLUMNS} FROM {CATALOG_TABLE}");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY id DESC");
    if query.limit > 0 {
        let limit = i64::try_from(query.limit)
            .map_err(|_| SqliteStoreError::Invalid("limit exceeds i64".to_string()))?;
        values.push(Value::Integer(limit));
        sql.push_str(&format!(" LIMIT ?{}", values.len()));
    }
    Ok((sql, values))
}

/// Appends `column op ?N` and binds its value as parameter `N`.
fn push_condition(
    conditions: &mut Vec<String>,
    values: &mut Vec<Value>,
    column: &str,
    op: &str,
    value: Value,
) {
    values.push(value);
    conditions.push(format!("{column} {op} ?{}", values.len()));
}

/// Decodes a summary from the leading [`SUMMARY_COLUMNS`] of a row.
fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<RunSummary> {
    Ok(RunSummary {
        run_id: RunId::new(row.get(0)?),
        name: row.get(1)?,
        setup: row.get(2)?,
        project: row.get(3)?,
        sample: row.get(4)?,
        start_time: row.get(5)?,
        stop_time: row.get(6)?,
        starred: row.get(7)?,
        upload_complete: row.get(8)?,
    })
}
