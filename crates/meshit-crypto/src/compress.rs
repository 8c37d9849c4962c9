//! Threshold-gated LZ4 block compression.
//!
//! Payloads shorter than [`COMPRESSION_THRESHOLD`] bytes are never
//! compressed, and a compressed form that fails to shrink the input is
//! discarded. The compressed block carries the original size prefix, so
//! decompression does not need it supplied out of band.

use crate::{CryptoError, Result};

/// Minimum payload size before compression is attempted.
pub const COMPRESSION_THRESHOLD: usize = 100;

/// Compress `data` if it is large enough and actually shrinks.
///
/// Returns `None` when the input is below the threshold or the compressed
/// form is not strictly smaller; callers then send the payload as-is.
pub fn maybe_compress(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() < COMPRESSION_THRESHOLD {
        return None;
    }
    match lz4::block::compress(data, None, true) {
        Ok(compressed) if compressed.len() < data.len() => Some(compressed),
        _ => None,
    }
}

/// Decompress an LZ4 block produced by [`maybe_compress`].
///
/// `original_size` overrides the embedded size prefix when supplied.
///
/// # Errors
///
/// Returns `CryptoError::Compression` on a malformed block.
pub fn decompress(data: &[u8], original_size: Option<i32>) -> Result<Vec<u8>> {
    lz4::block::decompress(data, original_size)
        .map_err(|e| CryptoError::Compression(e.to_string()))
}
