//! Checksummed, compressed message framing for conduitwire.
//!
//! Every message is framed with a 12-byte little-endian header:
//! - a 4-byte magic number (`0x12344321`) for stream synchronization
//! - the 4-byte length of the compressed payload
//! - the 4-byte CRC-32 of the compressed payload
//!
//! followed by the payload itself, a raw LZ4 block. Readers verify the
//! checksum before decompressing and can resynchronize on the next magic
//! after corruption.

pub mod checksum;
pub mod codec;
pub mod compression;
pub mod error;
pub mod reader;
pub mod writer;

pub use checksum::{checksum, Crc32};
pub use codec::{
    encode_frame, verify_and_decompress, write_frame, FrameConfig, FrameHeader, ResyncPolicy,
    DEFAULT_MAX_DECOMPRESSED, DEFAULT_MAX_PAYLOAD, DEFAULT_MAX_RESYNC_SKIP, HEADER_SIZE, MAGIC,
};
pub use compression::{compress, decompress};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
