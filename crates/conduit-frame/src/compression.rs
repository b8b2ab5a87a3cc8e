//! Raw LZ4 block compression.
//!
//! Payloads are bare LZ4 blocks: no container framing and no size prefix.
//! The decompressed size is therefore unknown to the receiver, so the output
//! buffer starts from a hint and doubles until it fits or reaches the
//! caller's bound. Hitting the bound is a [`FrameError::Capacity`], never a
//! silent truncation.

use lz4_flex::block::DecompressError;

use crate::error::{FrameError, Result};

const MIN_DECOMPRESS_CAPACITY: usize = 256;

/// Initial output size relative to the compressed size.
const EXPANSION_HINT: usize = 4;

/// Compress `bytes` into a raw LZ4 block of at most `max_output` bytes.
///
/// Empty input yields empty output.
pub fn compress(bytes: &[u8], max_output: usize) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    let compressed = lz4_flex::block::compress(bytes);
    let max = max_output.min(u32::MAX as usize);
    if compressed.len() > max {
        return Err(FrameError::Capacity {
            size: compressed.len(),
            max,
        });
    }
    Ok(compressed)
}

/// Decompress a raw LZ4 block, allowing at most `max_output` bytes of output.
///
/// Empty input yields empty output.
pub fn decompress(bytes: &[u8], max_output: usize) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut capacity = bytes
        .len()
        .saturating_mul(EXPANSION_HINT)
        .max(MIN_DECOMPRESS_CAPACITY)
        .min(max_output);

    loop {
        let mut out = vec![0u8; capacity];
        match lz4_flex::block::decompress_into(bytes, &mut out) {
            Ok(written) => {
                out.truncate(written);
                return Ok(out);
            }
            Err(DecompressError::OutputTooSmall { expected, .. }) => {
                if capacity >= max_output {
                    return Err(FrameError::Capacity {
                        size: expected.max(capacity.saturating_add(1)),
                        max: max_output,
                    });
                }
                capacity = capacity.saturating_mul(2).min(max_output);
            }
            Err(err) => return Err(FrameError::Decompress(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUND: usize = 16 * 1024 * 1024;

    #[test]
    fn empty_roundtrip() {
        let compressed = compress(b"", BOUND).unwrap();
        assert!(compressed.is_empty());
        assert!(decompress(&compressed, BOUND).unwrap().is_empty());
    }

    #[test]
    fn text_roundtrip() {
        let text = br#"{"action":"send","message":"hello conduit","target":"Conduit 1"}"#;
        let compressed = compress(text, BOUND).unwrap();
        assert_eq!(decompress(&compressed, BOUND).unwrap(), text);
    }

    #[test]
    fn highly_compressible_grows_buffer() {
        // Ratio far above the initial hint forces several doublings.
        let data = vec![b'z'; 200_000];
        let compressed = compress(&data, BOUND).unwrap();
        assert!(compressed.len() * EXPANSION_HINT < data.len());
        assert_eq!(decompress(&compressed, BOUND).unwrap(), data);
    }

    #[test]
    fn larger_than_legacy_scratch_buffer() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let compressed = compress(&data, BOUND).unwrap();
        assert_eq!(decompress(&compressed, BOUND).unwrap(), data);
    }

    #[test]
    fn decompress_bound_reports_capacity() {
        let data = vec![7u8; 10_000];
        let compressed = compress(&data, BOUND).unwrap();
        let err = decompress(&compressed, 1024).unwrap_err();
        assert!(matches!(err, FrameError::Capacity { max: 1024, .. }));
    }

    #[test]
    fn compress_bound_reports_capacity() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        let err = compress(&data, 16).unwrap_err();
        assert!(matches!(err, FrameError::Capacity { max: 16, .. }));
    }

    #[test]
    fn garbage_is_not_silently_accepted() {
        // Token promising a long literal run that is not present.
        let err = decompress(&[0xF0, 0xFF, 0xFF, 0x01], BOUND).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Decompress(_) | FrameError::Capacity { .. }
        ));
    }
}
