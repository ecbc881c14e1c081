// crates/meas-store-sqlite/src/naming.rs
// ============================================================================
// Module: Run Table Naming
// Description: Derivation and validation of per-run table identifiers.
// Purpose: Keep free-text provenance out of raw SQL identifiers.
// Dependencies: meas-store-core
// ============================================================================

//! ## Overview
//! Per-run tables are named `run_<id>_<setup>_<project>_<sample>` where each
//! provenance field is reduced to a short lowercase `[a-z0-9_]` slug. The
//! numeric id prefix makes names unique; slugs only aid humans browsing the
//! database. Any name read back from the catalog is re-validated before it is
//! interpolated into SQL.

use meas_store_core::RunId;

use crate::store::SqliteStoreError;

/// Prefix of every per-run table name.
const TABLE_PREFIX: &str = "run_";
/// Maximum slug length per provenance field.
const MAX_SLUG_LENGTH: usize = 24;
/// Maximum identifier length accepted for per-run tables.
const MAX_TABLE_NAME_LENGTH: usize = 128;

/// Derives the per-run table name for a freshly registered run.
#[must_use]
pub fn derive_table_name(run_id: RunId, setup: &str, project: &str, sample: &str) -> String {
    format!("{TABLE_PREFIX}{run_id}_{}_{}_{}", slug(setup), slug(project), slug(sample))
}

/// Checks that a table name is a safe bare identifier.
///
/// # Errors
///
/// Returns [`SqliteStoreError::Invalid`] for empty, overlong, or non
/// `[A-Za-z0-9_]` names, or names not starting with a letter.
pub fn validate_table_name(name: &str) -> Result<(), SqliteStoreError> {
    let starts_with_letter = name.chars().next().is_some_and(|ch| ch.is_ascii_alphabetic());
    if !starts_with_letter
        || name.len() > MAX_TABLE_NAME_LENGTH
        || !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
    {
        return Err(SqliteStoreError::Invalid(format!("unsafe table name: `{name}`")));
    }
    Ok(())
}

/// Returns the double-quoted identifier for a validated table name.
pub(crate) fn quoted(name: &str) -> Result<String, SqliteStoreError> {
    validate_table_name(name)?;
    Ok(format!("\"{name}\""))
}

/// Reduces free text to a lowercase `[a-z0-9_]` slug.
fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_SLUG_LENGTH));
    for ch in text.chars().flat_map(char::to_lowercase) {
        if out.len() >= MAX_SLUG_LENGTH {
            break;
        }
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    if out.is_empty() { "x".to_string() } else { out }
}
