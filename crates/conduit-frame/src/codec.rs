use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::checksum;
use crate::compression::{compress, decompress};
use crate::error::{FrameError, Result};

/// Frame header: magic (4) + size (4) + checksum (4) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Magic number opening every frame.
pub const MAGIC: u32 = 0x1234_4321;

/// Magic as it appears on the wire.
pub const MAGIC_BYTES: [u8; 4] = MAGIC.to_le_bytes();

/// Default maximum compressed payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default maximum decompressed payload size: 16 MiB.
pub const DEFAULT_MAX_DECOMPRESSED: usize = 16 * 1024 * 1024;

/// Default number of bytes a reader may discard while resynchronizing.
pub const DEFAULT_MAX_RESYNC_SKIP: usize = 64 * 1024;

/// Fixed-size frame header.
///
/// Wire format, all fields little-endian:
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬──────────────────┐
/// │ Magic (4B)   │ Size (4B)    │ Checksum (4B)│ Payload          │
/// │ 0x12344321   │ payload len  │ CRC-32 of    │ (Size bytes,     │
/// │              │              │ payload      │  raw LZ4 block)  │
/// └──────────────┴──────────────┴──────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: u32,
    /// Length of the compressed payload that follows.
    pub size: u32,
    /// CRC-32 of the compressed payload.
    pub checksum: u32,
}

impl FrameHeader {
    /// Header for a compressed payload.
    pub fn for_payload(compressed: &[u8]) -> Result<Self> {
        let size = u32::try_from(compressed.len()).map_err(|_| FrameError::PayloadTooLarge {
            size: compressed.len(),
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            magic: MAGIC,
            size,
            checksum: checksum(compressed),
        })
    }

    /// Parse the three header fields. The magic is not validated here.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let field = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self {
            magic: field(0),
            size: field(4),
            checksum: field(8),
        }
    }

    /// Parse and require the protocol magic.
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let header = Self::parse(bytes);
        if header.magic != MAGIC {
            return Err(FrameError::InvalidMagic {
                found: header.magic,
            });
        }
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic.to_le_bytes());
        out[4..8].copy_from_slice(&self.size.to_le_bytes());
        out[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    pub fn payload_len(&self) -> usize {
        self.size as usize
    }
}

/// Resynchronization behavior when a reader meets bytes that are not a header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncPolicy {
    /// Fail with [`FrameError::InvalidMagic`] on the first bad header.
    Disabled,
    /// Discard bytes until the next magic, failing with
    /// [`FrameError::ResyncExhausted`] after `max_skip` bytes.
    ScanForMagic { max_skip: usize },
}

impl Default for ResyncPolicy {
    fn default() -> Self {
        ResyncPolicy::ScanForMagic {
            max_skip: DEFAULT_MAX_RESYNC_SKIP,
        }
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum compressed payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Maximum decompressed payload size in bytes. Default: 16 MiB.
    pub max_decompressed_size: usize,
    /// What a reader does on a bad header.
    pub resync: ResyncPolicy,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED,
            resync: ResyncPolicy::default(),
        }
    }
}

/// Compress a plaintext payload and build its header.
pub fn encode_frame(plain: &[u8], config: &FrameConfig) -> Result<(FrameHeader, Bytes)> {
    if plain.len() > config.max_decompressed_size {
        return Err(FrameError::Capacity {
            size: plain.len(),
            max: config.max_decompressed_size,
        });
    }
    let compressed = compress(plain, config.max_payload_size)?;
    let header = FrameHeader::for_payload(&compressed)?;
    Ok((header, Bytes::from(compressed)))
}

/// Encode a complete frame (header followed by payload) into `dst`.
pub fn write_frame(plain: &[u8], config: &FrameConfig, dst: &mut BytesMut) -> Result<()> {
    let (header, payload) = encode_frame(plain, config)?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&header.to_bytes());
    dst.put_slice(&payload);
    Ok(())
}

/// Check a received payload against its header checksum and decompress it.
///
/// A mismatch discards the frame; no partial recovery is attempted.
pub fn verify_and_decompress(
    payload: &[u8],
    expected_checksum: u32,
    max_output: usize,
) -> Result<Bytes> {
    let actual = checksum(payload);
    if actual != expected_checksum {
        return Err(FrameError::ChecksumMismatch {
            expected: expected_checksum,
            actual,
        });
    }
    if payload.is_empty() {
        return Ok(Bytes::new());
    }
    Ok(Bytes::from(decompress(payload, max_output)?))
}
