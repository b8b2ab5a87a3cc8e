use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::codec::{
    verify_and_decompress, FrameConfig, FrameHeader, ResyncPolicy, HEADER_SIZE, MAGIC,
    MAGIC_BYTES,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `AsyncRead` stream.
///
/// Handles partial reads internally; callers always get the verified,
/// decompressed payload of one whole frame. A checksum mismatch is reported
/// for that frame only; the next call continues with the following frame.
/// Bytes that do not start with a valid header are skipped according to the
/// configured [`ResyncPolicy`].
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    skipped: usize,
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            skipped: 0,
        }
    }

    /// Read the next frame and return its decompressed payload.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub async fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(frame) = self.decode_buffered() {
                return frame;
            }

            if self.buf.capacity() - self.buf.len() < READ_CHUNK_SIZE {
                self.buf.reserve(READ_CHUNK_SIZE);
            }
            let read = self.inner.read_buf(&mut self.buf).await?;
            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    /// Decode one frame from the buffer, or `None` if more bytes are needed.
    fn decode_buffered(&mut self) -> Option<Result<Bytes>> {
        loop {
            if self.buf.len() < HEADER_SIZE {
                return None;
            }

            let mut raw = [0u8; HEADER_SIZE];
            raw.copy_from_slice(&self.buf[..HEADER_SIZE]);
            let header = FrameHeader::parse(&raw);

            let fault = if header.magic != MAGIC {
                Some(FrameError::InvalidMagic {
                    found: header.magic,
                })
            } else if header.payload_len() > self.config.max_payload_size {
                Some(FrameError::PayloadTooLarge {
                    size: header.payload_len(),
                    max: self.config.max_payload_size,
                })
            } else {
                None
            };

            if let Some(fault) = fault {
                if let Err(err) = self.skip_to_next_magic(fault) {
                    return Some(Err(err));
                }
                continue;
            }

            let total = HEADER_SIZE + header.payload_len();
            if self.buf.len() < total {
                self.buf.reserve(total - self.buf.len());
                return None;
            }

            self.buf.advance(HEADER_SIZE);
            let payload = self.buf.split_to(header.payload_len()).freeze();

            if self.skipped > 0 {
                warn!(skipped = self.skipped, "frame sync recovered");
                self.skipped = 0;
            }

            return Some(verify_and_decompress(
                &payload,
                header.checksum,
                self.config.max_decompressed_size,
            ));
        }
    }

    fn skip_to_next_magic(&mut self, fault: FrameError) -> Result<()> {
        let max_skip = match self.config.resync {
            ResyncPolicy::Disabled => return Err(fault),
            ResyncPolicy::ScanForMagic { max_skip } => max_skip,
        };

        if self.skipped == 0 {
            debug!(error = %fault, "lost frame sync, scanning for magic");
        }

        // Always drop at least the first byte; keep a possible partial magic
        // at the tail of the buffer.
        let discard = match self.buf[1..]
            .windows(MAGIC_BYTES.len())
            .position(|window| window == MAGIC_BYTES)
        {
            Some(pos) => pos + 1,
            None => self.buf.len() - (MAGIC_BYTES.len() - 1),
        };

        self.buf.advance(discard);
        self.skipped += discard;

        if self.skipped > max_skip {
            return Err(FrameError::ResyncExhausted {
                skipped: self.skipped,
            });
        }
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
