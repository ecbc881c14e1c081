// crates/meas-store-core/src/codec.rs
// ============================================================================
// Module: Array Metadata Codec
// Description: Compact textual encoding for shape and dependency lists.
// Purpose: Store list-valued channel metadata in plain text columns.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Integer lists encode as `[1,2,3]`; string lists encode as
//! `["a", "b"]` with `", "` between quoted elements. Backslashes and quotes
//! inside string elements are escaped so any string list decodes back to
//! itself. The empty list encodes as `[]`, and the legacy `[ ]` form decodes
//! to the empty list as well. Decoding is all-or-nothing: a malformed input
//! yields [`MetadataError`] and never a partial list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Display;
use std::fmt::Write;
use std::str::FromStr;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between encoded integer elements.
const INT_SEPARATOR: char = ',';
/// Separator between encoded string elements.
const STRING_SEPARATOR: &str = ", ";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Metadata decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    /// Input is not wrapped in `[` and `]`.
    #[error("metadata list must be wrapped in brackets")]
    MissingBrackets,
    /// An integer element failed to parse.
    #[error("metadata element {position} is not an integer: `{element}`")]
    InvalidInteger {
        /// Zero-based element position.
        position: usize,
        /// Offending element text.
        element: String,
    },
    /// A string element is not enclosed in quotes.
    #[error("metadata element {position} is not a quoted string")]
    UnquotedString {
        /// Zero-based element position.
        position: usize,
    },
    /// A string element ends before its closing quote.
    #[error("metadata element {position} has an unterminated string")]
    UnterminatedString {
        /// Zero-based element position.
        position: usize,
    },
    /// Elements are not separated by the expected separator.
    #[error("metadata element {position} is not followed by a separator")]
    MissingSeparator {
        /// Zero-based element position.
        position: usize,
    },
}

// ============================================================================
// SECTION: Integer Lists
// ============================================================================

/// Encodes an integer list as `[a,b,c]`.
#[must_use]
pub fn encode_int_sequence<T: Display>(values: &[T]) -> String {
    let mut out = String::from("[");
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push(INT_SEPARATOR);
        }
        let _ = write!(out, "{value}");
    }
    out.push(']');
    out
}

/// Decodes an integer list produced by [`encode_int_sequence`].
///
/// Whitespace around elements is tolerated.
///
/// # Errors
///
/// Returns [`MetadataError`] when brackets are missing or an element does not
/// parse.
pub fn decode_int_sequence<T: FromStr>(text: &str) -> Result<Vec<T>, MetadataError> {
    let inner = strip_brackets(text)?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(INT_SEPARATOR)
        .enumerate()
        .map(|(position, element)| {
            element.trim().parse::<T>().map_err(|_| MetadataError::InvalidInteger {
                position,
                element: element.to_string(),
            })
        })
        .collect()
}

// ============================================================================
// SECTION: String Lists
// ============================================================================

/// Encodes a string list as `["a", "b"]`.
#[must_use]
pub fn encode_string_sequence<S: AsRef<str>>(values: &[S]) -> String {
    let mut out = String::from("[");
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            out.push_str(STRING_SEPARATOR);
        }
        out.push('"');
        for ch in value.as_ref().chars() {
            if ch == '"' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push('"');
    }
    out.push(']');
    out
}

/// Decodes a string list produced by [`encode_string_sequence`].
///
/// # Errors
///
/// Returns [`MetadataError`] when brackets, quotes, or separators are
/// missing.
pub fn decode_string_sequence(text: &str) -> Result<Vec<String>, MetadataError> {
    let inner = strip_brackets(text)?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut values = Vec::new();
    let mut rest = inner;
    loop {
        let position = values.len();
        let Some(body) = rest.strip_prefix('"') else {
            return Err(MetadataError::UnquotedString {
                position,
            });
        };
        let (value, consumed) = read_quoted(body, position)?;
        values.push(value);
        rest = &body[consumed ..];
        if rest.is_empty() {
            return Ok(values);
        }
        rest = rest.strip_prefix(STRING_SEPARATOR).ok_or(MetadataError::MissingSeparator {
            position,
        })?;
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the text between the outer brackets.
fn strip_brackets(text: &str) -> Result<&str, MetadataError> {
    text.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or(MetadataError::MissingBrackets)
}

/// Reads a quoted body up to its closing quote.
///
/// Returns the unescaped value and the number of bytes consumed, including
/// the closing quote.
fn read_quoted(body: &str, position: usize) -> Result<(String, usize), MetadataError> {
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '"' => return Ok((value, offset + ch.len_utf8())),
            '\\' => match chars.next() {
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            other => value.push(other),
        }
    }
    Err(MetadataError::UnterminatedString {
        position,
    })
}
