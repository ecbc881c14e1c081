// crates/meas-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Dataset Store
// Description: RunStore facade over the run catalog and per-run tables.
// Purpose: Orchestrate registration, channel writes, listings, and retrieval.
// Dependencies: meas-store-core, rusqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteDatasetStore`] owns one `SQLite` connection guarded by a mutex, so
//! each store instance has at most one statement in flight. Saving registers
//! the run, creates its table, and writes channels one row at a time; a failed
//! channel leaves the run visible with `completed = 0` rather than rolling the
//! rows back. Transport failures surface as [`StoreError::ConnectionLost`] and
//! are never retried here.
//! Security posture: catalog rows and channel rows are untrusted on read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use meas_store_core::Channel;
use meas_store_core::Run;
use meas_store_core::RunId;
use meas_store_core::RunQuery;
use meas_store_core::RunStore;
use meas_store_core::RunSummary;
use meas_store_core::SampleInfo;
use meas_store_core::SaveReport;
use meas_store_core::StoreError;
use meas_store_core::WriteMode;
use meas_store_core::derive_keywords;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use thiserror::Error;

use crate::catalog::CatalogRecord;
use crate::catalog::RunCatalog;
use crate::config::ConfigError;
use crate::config::SqliteStoreConfig;
use crate::naming::validate_table_name;
use crate::tables::RunTableManager;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` measurement store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Connection-level failure (open, I/O, locking, poisoned guard).
    #[error("sqlite store connection lost: {0}")]
    ConnectionLost(String),
    /// Catalog row is inconsistent with the database contents.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input or configuration.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Run identifier is unknown.
    #[error("run {0} not found")]
    NotFound(RunId),
    /// Object already exists.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Channel metadata failed to decode.
    #[error("malformed metadata in {table} row {row}: {message}")]
    MalformedMetadata {
        /// Per-run table name.
        table: String,
        /// Row id (positional channel index).
        row: i64,
        /// Decoding failure description.
        message: String,
    },
    /// Channel payload is shorter or longer than declared.
    #[error("truncated payload in {table} row {row}: {message}")]
    TruncatedPayload {
        /// Per-run table name.
        table: String,
        /// Row id (positional channel index).
        row: i64,
        /// Decoding failure description.
        message: String,
    },
    /// Channel row could not be written.
    #[error("channel {index} write failed: {message}")]
    ChannelWrite {
        /// Positional index of the channel.
        index: usize,
        /// Failure description.
        message: String,
    },
    /// Strict-mode save stopped at a failed channel of a registered run.
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
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::ConnectionLost(message) => Self::ConnectionLost(message),
            SqliteStoreError::Corrupt(message) => Self::CorruptCatalog(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::NotFound(run_id) => Self::NotFound(run_id),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::MalformedMetadata {
                table,
                row,
                message,
            } => Self::MalformedMetadata {
                table,
                row,
                message,
            },
            SqliteStoreError::TruncatedPayload {
                table,
                row,
                message,
            } => Self::TruncatedPayload {
                table,
                row,
                message,
            },
            SqliteStoreError::ChannelWrite {
                index,
                message,
            } => Self::ChannelWrite {
                index,
                message,
            },
            SqliteStoreError::SaveAborted {
                run_id,
                table_name,
                index,
                message,
            } => Self::SaveAborted {
                run_id,
                table_name,
                index,
                message,
            },
        }
    }
}

impl From<ConfigError> for SqliteStoreError {
    fn from(error: ConfigError) -> Self {
        match error {
            ConfigError::Io(message) => Self::Io(message),
            ConfigError::Parse(message) | ConfigError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Classifies a rusqlite error, separating transport failures.
pub(crate) fn db_error(error: rusqlite::Error) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &error
        && matches!(
            failure.code,
            ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::FileLockingProtocolFailed
        )
    {
        return SqliteStoreError::ConnectionLost(error.to_string());
    }
    SqliteStoreError::Db(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Run loaded with per-row decoding faults set aside.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialRun {
    /// Run holding every channel that decoded.
    pub run: Run,
    /// Decoding faults of the remaining rows.
    pub faults: Vec<SqliteStoreError>,
}

/// `SQLite`-backed dataset store.
#[derive(Clone)]
pub struct SqliteDatasetStore {
    /// Channel write policy applied by [`RunStore::save`].
    write_mode: WriteMode,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDatasetStore {
    /// Opens the store at the configured path, creating the catalog if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the config is invalid or the database
    /// cannot be opened or initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        Self::from_connection(connection, config.write_mode)
    }

    /// Wraps an already-opened connection, creating the catalog if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the catalog cannot be initialized.
    pub fn from_connection(
        connection: Connection,
        write_mode: WriteMode,
    ) -> Result<Self, SqliteStoreError> {
        RunCatalog::new(&connection).initialize()?;
        Ok(Self {
            write_mode,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the write mode used by [`RunStore::save`].
    #[must_use]
    pub const fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Saves a run using an explicit write mode.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when registration or table creation fails,
    /// on transport failure, or with [`SqliteStoreError::SaveAborted`] when a
    /// channel fails under [`WriteMode::Strict`]. Rows written before a
    /// strict-mode failure remain stored under the reported run.
    pub fn save_with_mode(
        &self,
        run: &Run,
        mode: WriteMode,
    ) -> Result<SaveReport, SqliteStoreError> {
        let keywords = derive_keywords(&run.channels);
        let guard = self.lock()?;
        let catalog = RunCatalog::new(&guard);
        let (run_id, table_name) = catalog.register(run, &keywords)?;
        let tables = RunTableManager::new(&guard);
        tables.create_table(&table_name)?;
        let outcome = tables.write_channels(&table_name, &run.channels, mode)?;
        let upload_complete = outcome.written.len() == run.channels.len();
        catalog.mark_upload(run_id, upload_complete, outcome.bytes)?;
        drop(guard);

        if mode == WriteMode::Strict
            && let Some(failure) = outcome.failed.first()
        {
            return Err(SqliteStoreError::SaveAborted {
                run_id,
                table_name,
                index: failure.index,
                message: failure.reason.clone(),
            });
        }
        tracing::info!(
            run_id = run_id.get(),
            table = %table_name,
            written = outcome.written.len(),
            failed = outcome.failed.len(),
            bytes = outcome.bytes,
            "saved run"
        );
        Ok(SaveReport {
            run_id,
            table_name,
            written: outcome.written,
            failed: outcome.failed,
            upload_complete,
            data_size: outcome.bytes,
        })
    }

    /// Loads a run, failing on the first undecodable channel row.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] for unknown identifiers,
    /// [`SqliteStoreError::Corrupt`] when the run's table is missing, and
    /// row decoding errors.
    pub fn load_run(&self, run_id: RunId) -> Result<Run, SqliteStoreError> {
        let guard = self.lock()?;
        let record = Self::resolve(&guard, run_id)?;
        let channels = RunTableManager::new(&guard).read_channels(&record.table_name)?;
        drop(guard);
        tracing::info!(run_id = run_id.get(), channels = channels.len(), "loaded run");
        Ok(assemble_run(record, channels))
    }

    /// Loads a run, keeping every channel that decodes.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] for unknown identifiers,
    /// [`SqliteStoreError::Corrupt`] when the run's table is missing, and
    /// transport errors. Row decoding faults are returned in
    /// [`PartialRun::faults`].
    pub fn load_partial(&self, run_id: RunId) -> Result<PartialRun, SqliteStoreError> {
        let guard = self.lock()?;
        let record = Self::resolve(&guard, run_id)?;
        let rows = RunTableManager::new(&guard).read_channel_rows(&record.table_name)?;
        drop(guard);
        let mut channels = Vec::with_capacity(rows.len());
        let mut faults = Vec::new();
        for row in rows {
            match row {
                Ok(channel) => channels.push(channel),
                Err(err) => {
                    tracing::warn!(run_id = run_id.get(), error = %err, "skipping damaged channel row");
                    faults.push(err);
                }
            }
        }
        Ok(PartialRun {
            run: assemble_run(record, channels),
            faults,
        })
    }

    /// Lists catalog rows matching the query.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the catalog query fails.
    pub fn list_runs(&self, query: &RunQuery) -> Result<Vec<RunSummary>, SqliteStoreError> {
        let guard = self.lock()?;
        RunCatalog::new(&guard).list(query)
    }

    /// Returns the full catalog row for a run.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] for unknown identifiers.
    pub fn catalog_entry(&self, run_id: RunId) -> Result<CatalogRecord, SqliteStoreError> {
        let guard = self.lock()?;
        RunCatalog::new(&guard).get(run_id)
    }

    /// Returns true when the run exists.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the lookup fails.
    pub fn exists(&self, run_id: RunId) -> Result<bool, SqliteStoreError> {
        let guard = self.lock()?;
        RunCatalog::new(&guard).exists(run_id)
    }

    /// Records a run's stop time.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] for unknown identifiers.
    pub fn finish(&self, run_id: RunId, stop_time: i64) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        RunCatalog::new(&guard).finish(run_id, stop_time)?;
        tracing::info!(run_id = run_id.get(), stop_time, "finished run");
        Ok(())
    }

    /// Sets or clears a run's starred flag.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::NotFound`] for unknown identifiers.
    pub fn set_starred(&self, run_id: RunId, starred: bool) -> Result<(), SqliteStoreError> {
        let guard = self.lock()?;
        RunCatalog::new(&guard).set_starred(run_id, starred)
    }

    /// Returns the distinct provenance triples.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the query fails.
    pub fn samples(&self) -> Result<Vec<SampleInfo>, SqliteStoreError> {
        let guard = self.lock()?;
        RunCatalog::new(&guard).samples()
    }

    /// Runs a closure against the underlying connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::ConnectionLost`] when the guard is poisoned,
    /// otherwise the closure's result.
    pub fn with_connection<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let guard = self.lock()?;
        operation(&guard)
    }

    /// Acquires the connection guard.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::ConnectionLost("connection mutex poisoned".to_string()))
    }

    /// Looks up a catalog row and checks that its table exists.
    fn resolve(connection: &Connection, run_id: RunId) -> Result<CatalogRecord, SqliteStoreError> {
        let record = RunCatalog::new(connection).get(run_id)?;
        let dangling = || {
            SqliteStoreError::Corrupt(format!(
                "run {run_id} references missing table `{}`",
                record.table_name
            ))
        };
        if validate_table_name(&record.table_name).is_err() {
            return Err(dangling());
        }
        if !RunTableManager::new(connection).table_exists(&record.table_name)? {
            return Err(dangling());
        }
        Ok(record)
    }
}

impl RunStore for SqliteDatasetStore {
    fn save(&self, run: &Run) -> Result<SaveReport, StoreError> {
        self.save_with_mode(run, self.write_mode).map_err(StoreError::from)
    }

    fn load(&self, run_id: RunId) -> Result<Run, StoreError> {
        self.load_run(run_id).map_err(StoreError::from)
    }

    fn list(&self, query: &RunQuery) -> Result<Vec<RunSummary>, StoreError> {
        self.list_runs(query).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a caller-owned run from its catalog row and decoded channels.
fn assemble_run(record: CatalogRecord, channels: Vec<Channel>) -> Run {
    let CatalogRecord {
        summary,
        table_name,
        snapshot,
        metadata,
        keywords,
        ..
    } = record;
    Run {
        run_id: Some(summary.run_id),
        table_name: Some(table_name),
        name: summary.name,
        setup: summary.setup,
        project: summary.project,
        sample: summary.sample,
        start_time: summary.start_time,
        stop_time: summary.stop_time,
        channels,
        snapshot,
        metadata,
        keywords,
        starred: summary.starred,
        upload_complete: summary.upload_complete,
    }
}

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Opens a connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    apply_pragmas(&connection, config)?;
    tracing::debug!(path = %config.path.display(), "opened measurement database");
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}
