// crates/meas-store-core/src/packing.rs
// ============================================================================
// Module: Binary Payload Packer
// Description: Little-endian IEEE-754 packing of flat f64 sample buffers.
// Purpose: Convert channel payloads to and from opaque binary column values.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Packed payloads are exactly `count * 8` bytes of little-endian `f64`
//! values with no header and no compression. The blob does not describe its
//! own length, so [`unpack`] takes the expected sample count from channel
//! metadata and rejects blobs whose size disagrees with it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::Write;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Bytes per packed sample.
pub const SAMPLE_BYTES: usize = 8;
/// Samples encoded per chunk when streaming into a writer.
const STREAM_CHUNK_SAMPLES: usize = 8 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Payload decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// Byte length is not a whole number of samples.
    #[error("payload length {len} is not a multiple of {SAMPLE_BYTES}")]
    Misaligned {
        /// Blob length in bytes.
        len: usize,
    },
    /// Blob holds fewer bytes than the declared count requires.
    #[error("payload truncated: expected {expected} bytes, found {actual}")]
    Truncated {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },
    /// Blob holds more samples than the declared count.
    #[error("payload has trailing data: expected {expected} bytes, found {actual}")]
    Trailing {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },
    /// Declared count cannot be represented in bytes.
    #[error("declared sample count {count} overflows")]
    CountOverflow {
        /// Declared sample count.
        count: usize,
    },
}

// ============================================================================
// SECTION: Packing
// ============================================================================

/// Returns the packed size in bytes of `count` samples.
#[must_use]
pub const fn packed_len(count: usize) -> Option<usize> {
    count.checked_mul(SAMPLE_BYTES)
}

/// Packs samples into a new byte buffer.
#[must_use]
pub fn pack(samples: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len().saturating_mul(SAMPLE_BYTES));
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Streams packed samples into a writer in bounded chunks.
///
/// # Errors
///
/// Returns [`io::Error`] when the writer fails.
pub fn pack_into<W: Write>(samples: &[f64], writer: &mut W) -> io::Result<()> {
    let mut chunk = Vec::with_capacity(STREAM_CHUNK_SAMPLES * SAMPLE_BYTES);
    for block in samples.chunks(STREAM_CHUNK_SAMPLES) {
        chunk.clear();
        for sample in block {
            chunk.extend_from_slice(&sample.to_le_bytes());
        }
        writer.write_all(&chunk)?;
    }
    Ok(())
}

/// Unpacks exactly `count` samples from a packed blob.
///
/// # Errors
///
/// Returns [`PayloadError`] when the blob is misaligned or its length does not
/// match `count` samples.
pub fn unpack(bytes: &[u8], count: usize) -> Result<Vec<f64>, PayloadError> {
    let expected = packed_len(count).ok_or(PayloadError::CountOverflow {
        count,
    })?;
    if bytes.len() % SAMPLE_BYTES != 0 {
        return Err(PayloadError::Misaligned {
            len: bytes.len(),
        });
    }
    if bytes.len() < expected {
        return Err(PayloadError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }
    if bytes.len() > expected {
        return Err(PayloadError::Trailing {
            expected,
            actual: bytes.len(),
        });
    }
    let samples = bytes
        .chunks_exact(SAMPLE_BYTES)
        .map(|chunk| {
            let mut raw = [0u8; SAMPLE_BYTES];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Ok(samples)
}
