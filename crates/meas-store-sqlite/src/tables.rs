// crates/meas-store-sqlite/src/tables.rs
// ============================================================================
// Module: Run Table Manager
// Description: Creation, population, and decoding of per-run channel tables.
// Purpose: Store one row per channel with codec metadata and a packed payload.
// Dependencies: meas-store-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! Every run owns one table with one row per channel. The row `id` is the
//! channel's positional index and doubles as the `SQLite` rowid. Extended
//! identity columns are nullable so plain and identity-bearing channels share
//! one schema. Payloads are decoded straight from the borrowed blob using the
//! row's declared count (explicit `size`, else the `shape` product), never the
//! blob length alone.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashSet;

use meas_store_core::Channel;
use meas_store_core::ChannelFailure;
use meas_store_core::ChannelIdentity;
use meas_store_core::ParamId;
use meas_store_core::WriteMode;
use meas_store_core::codec::decode_int_sequence;
use meas_store_core::codec::decode_string_sequence;
use meas_store_core::codec::encode_int_sequence;
use meas_store_core::codec::encode_string_sequence;
use meas_store_core::packing::pack;
use meas_store_core::packing::unpack;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use rusqlite::types::ValueRef;

use crate::naming::quoted;
use crate::naming::validate_table_name;
use crate::store::SqliteStoreError;
use crate::store::db_error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Columns read back for every channel row, in decode order.
const CHANNEL_COLUMNS: &str = "id, param_id, nth_set, param_id_m_param, setpoint, \
                               setpoint_local, name_global, name, label, unit, dependencies, \
                               shape, size, rawdata";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome of writing a run's channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelWriteOutcome {
    /// Indices written successfully.
    pub written: Vec<usize>,
    /// Channels that failed to write.
    pub failed: Vec<ChannelFailure>,
    /// Packed payload bytes written.
    pub bytes: u64,
}

/// Per-run table operations over a borrowed connection.
pub struct RunTableManager<'conn> {
    /// Connection used for every statement.
    connection: &'conn Connection,
}

// ============================================================================
// SECTION: Table Manager
// ============================================================================

impl<'conn> RunTableManager<'conn> {
    /// Wraps a connection.
    #[must_use]
    pub const fn new(connection: &'conn Connection) -> Self {
        Self {
            connection,
        }
    }

    /// Returns true when the named table exists.
    ///
    /// # Errors
    ///
    /// Returns database errors.
    pub fn table_exists(&self, table_name: &str) -> Result<bool, SqliteStoreError> {
        let found: Option<i64> = self
            .connection
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        Ok(found.is_some())
    }

    /// Creates the channel table for a run.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Conflict`] when the table already exists
    /// and [`SqliteStoreError::Invalid`] for unsafe names.
    pub fn create_table(&self, table_name: &str) -> Result<(), SqliteStoreError> {
        validate_table_name(table_name)?;
        if self.table_exists(table_name)? {
            return Err(SqliteStoreError::Conflict(format!("table {table_name} already exists")));
        }
        let table = quoted(table_name)?;
        self.connection
            .execute_batch(&format!(
                "CREATE TABLE {table} (
                    id INTEGER PRIMARY KEY,
                    param_id INTEGER,
                    nth_set INTEGER,
                    param_id_m_param INTEGER,
                    setpoint INTEGER,
                    setpoint_local INTEGER,
                    name_global TEXT,
                    name TEXT NOT NULL,
                    label TEXT NOT NULL,
                    unit TEXT NOT NULL,
                    dependencies TEXT NOT NULL,
                    shape TEXT NOT NULL,
                    size INTEGER,
                    rawdata BLOB
                );"
            ))
            .map_err(db_error)?;
        tracing::debug!(table = table_name, "created run table");
        Ok(())
    }

    /// Writes one channel row at its positional index.
    ///
    /// Returns the number of packed payload bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::ChannelWrite`] for integrity faults or
    /// rejected inserts, and [`SqliteStoreError::ConnectionLost`] for
    /// transport failures.
    pub fn write_channel(
        &self,
        table_name: &str,
        index: usize,
        channel: &Channel,
    ) -> Result<u64, SqliteStoreError> {
        let table = quoted(table_name)?;
        let channel_write = |message: String| SqliteStoreError::ChannelWrite {
            index,
            message,
        };
        channel.validate().map_err(|err| channel_write(err.to_string()))?;
        let row_id = i64::try_from(index).map_err(|err| channel_write(err.to_string()))?;
        let size = channel
            .size
            .map(i64::try_from)
            .transpose()
            .map_err(|err| channel_write(err.to_string()))?;
        let identity = channel.identity.as_ref();
        let packed = pack(&channel.payload);
        let bytes = u64::try_from(packed.len()).map_err(|err| channel_write(err.to_string()))?;
        let result = self.connection.execute(
            &format!(
                "INSERT INTO {table} (id, param_id, nth_set, param_id_m_param, setpoint, \
                 setpoint_local, name_global, name, label, unit, dependencies, shape, size, \
                 rawdata) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
            ),
            params![
                row_id,
                identity.map(|id| id.param_id.get()),
                identity.map(|id| id.set_index),
                identity.and_then(|id| id.setpoint_param_id).map(ParamId::get),
                identity.map(|id| id.is_setpoint),
                identity.map(|id| id.is_local_setpoint),
                identity.map(|id| id.global_name.as_str()),
                channel.name,
                channel.label,
                channel.unit,
                encode_string_sequence(&channel.dependency),
                encode_int_sequence(&channel.shape),
                size,
                packed
            ],
        );
        match result.map_err(db_error) {
            Ok(_) => Ok(bytes),
            Err(err @ SqliteStoreError::ConnectionLost(_)) => Err(err),
            Err(err) => Err(channel_write(err.to_string())),
        }
    }

    /// Writes channels in positional order.
    ///
    /// Lenient mode attempts every channel; strict mode stops after the first
    /// failure. Failures are collected per channel index either way. A channel
    /// whose name repeats an earlier channel of the same run is a failure.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::ConnectionLost`] immediately on transport
    /// failure; per-channel faults are reported in the outcome instead.
    pub fn write_channels(
        &self,
        table_name: &str,
        channels: &[Channel],
        mode: WriteMode,
    ) -> Result<ChannelWriteOutcome, SqliteStoreError> {
        let mut outcome = ChannelWriteOutcome::default();
        let mut seen: HashSet<&str> = HashSet::with_capacity(channels.len());
        for (index, channel) in channels.iter().enumerate() {
            let result = if seen.insert(channel.name.as_str()) {
                self.write_channel(table_name, index, channel)
            } else {
                Err(SqliteStoreError::ChannelWrite {
                    index,
                    message: format!("duplicate channel name `{}`", channel.name),
                })
            };
            match result {
                Ok(bytes) => {
                    outcome.written.push(index);
                    outcome.bytes = outcome.bytes.saturating_add(bytes);
                }
                Err(err @ SqliteStoreError::ConnectionLost(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!(table = table_name, index, error = %err, "channel write failed");
                    let reason = match err {
                        SqliteStoreError::ChannelWrite {
                            message,
                            ..
                        } => message,
                        other => other.to_string(),
                    };
                    outcome.failed.push(ChannelFailure {
                        index,
                        reason,
                    });
                    if mode == WriteMode::Strict {
                        break;
                    }
                }
            }
        }
        Ok(outcome)
    }

    /// Reads every channel row, failing on the first undecodable row.
    ///
    /// # Errors
    ///
    /// Returns database errors, or the decoding error of the first damaged
    /// row with its index.
    pub fn read_channels(&self, table_name: &str) -> Result<Vec<Channel>, SqliteStoreError> {
        self.read_channel_rows(table_name)?.into_iter().collect()
    }

    /// Reads every channel row, decoding each independently.
    ///
    /// The outer result fails only for query or transport errors; each inner
    /// result carries that row's decoding outcome.
    ///
    /// # Errors
    ///
    /// Returns database errors when the table cannot be queried.
    pub fn read_channel_rows(
        &self,
        table_name: &str,
    ) -> Result<Vec<Result<Channel, SqliteStoreError>>, SqliteStoreError> {
        let table = quoted(table_name)?;
        let mut statement = self
            .connection
            .prepare(&format!("SELECT {CHANNEL_COLUMNS} FROM {table} ORDER BY id"))
            .map_err(db_error)?;
        let mut rows = statement.query(params![]).map_err(db_error)?;
        let mut channels = Vec::new();
        while let Some(row) = rows.next().map_err(db_error)? {
            channels.push(decode_channel_row(table_name, row));
        }
        Ok(channels)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Decodes one channel row.
fn decode_channel_row(table_name: &str, row: &Row<'_>) -> Result<Channel, SqliteStoreError> {
    let id: i64 = row.get(0).map_err(db_error)?;
    let malformed = |message: String| SqliteStoreError::MalformedMetadata {
        table: table_name.to_string(),
        row: id,
        message,
    };
    let param_id: Option<i64> = row.get(1).map_err(db_error)?;
    let set_index: Option<i64> = row.get(2).map_err(db_error)?;
    let setpoint_param_id: Option<i64> = row.get(3).map_err(db_error)?;
    let is_setpoint: Option<bool> = row.get(4).map_err(db_error)?;
    let is_local_setpoint: Option<bool> = row.get(5).map_err(db_error)?;
    let global_name: Option<String> = row.get(6).map_err(db_error)?;
    let dependency_text: String = row.get(10).map_err(db_error)?;
    let shape_text: String = row.get(11).map_err(db_error)?;
    let size: Option<i64> = row.get(12).map_err(db_error)?;

    let dependency = decode_string_sequence(&dependency_text)
        .map_err(|err| malformed(format!("dependencies: {err}")))?;
    let shape = decode_int_sequence::<usize>(&shape_text)
        .map_err(|err| malformed(format!("shape: {err}")))?;
    let size = size
        .map(usize::try_from)
        .transpose()
        .map_err(|_| malformed("size must be non-negative".to_string()))?;
    let identity = param_id.map(|param_id| ChannelIdentity {
        param_id: ParamId::new(param_id),
        set_index: set_index.unwrap_or_default(),
        setpoint_param_id: setpoint_param_id.map(ParamId::new),
        is_setpoint: is_setpoint.unwrap_or_default(),
        is_local_setpoint: is_local_setpoint.unwrap_or_default(),
        global_name: global_name.unwrap_or_default(),
    });
    let mut channel = Channel {
        name: row.get(7).map_err(db_error)?,
        label: row.get(8).map_err(db_error)?,
        unit: row.get(9).map_err(db_error)?,
        dependency,
        shape,
        size,
        identity,
        payload: Vec::new(),
    };
    let count = channel.declared_len().map_err(|err| malformed(err.to_string()))?;
    let blob = match row.get_ref(13).map_err(db_error)? {
        ValueRef::Blob(bytes) => bytes,
        ValueRef::Null => &[],
        _ => return Err(malformed("rawdata is not a blob".to_string())),
    };
    channel.payload = unpack(blob, count).map_err(|err| SqliteStoreError::TruncatedPayload {
        table: table_name.to_string(),
        row: id,
        message: err.to_string(),
    })?;
    Ok(channel)
}
