/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame header contains an invalid magic number.
    #[error("invalid frame magic 0x{found:08x} (expected 0x12344321)")]
    InvalidMagic { found: u32 },

    /// The compressed payload does not match the checksum in its header.
    #[error("payload checksum mismatch (header 0x{expected:08x}, computed 0x{actual:08x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// A compression buffer would need to grow past its bound.
    #[error("payload exceeds codec capacity ({size} bytes, max {max})")]
    Capacity { size: usize, max: usize },

    /// The announced payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload passed its checksum but is not a valid LZ4 block.
    #[error("payload decompression failed: {0}")]
    Decompress(String),

    /// Too many bytes were discarded while searching for the next frame.
    #[error("lost frame sync after skipping {skipped} bytes")]
    ResyncExhausted { skipped: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the stream is still aligned on a frame boundary after this error.
    ///
    /// Recoverable errors affect one frame only; the reader can keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::ChecksumMismatch { .. }
                | FrameError::Capacity { .. }
                | FrameError::Decompress(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
