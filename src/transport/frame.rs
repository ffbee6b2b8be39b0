//! Native-messaging frame codec
//!
//! Frames are a 32-bit unsigned little-endian length prefix followed by the
//! UTF-8 JSON payload, in both directions.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are treated as protocol corruption
pub const DEFAULT_MAX_FRAME_LEN: u32 = 10 * 1024 * 1024;

/// Error types for frame I/O; both are fatal to the run loop
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame too large: {len} bytes (limit: {max})")]
    Oversize { len: u32, max: u32 },
}

/// Length-prefixed message framing over a pair of byte streams
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_len: u32,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl FrameCodec {
    pub fn with_max_len(max_len: u32) -> Self {
        Self { max_len }
    }

    /// Read one frame. `Ok(None)` means the stream closed before a length
    /// prefix, which is the clean shutdown signal. Short payload reads are
    /// I/O errors.
    pub async fn read<R>(&self, reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let mut prefix = [0u8; 4];
        match reader.read_exact(&mut prefix).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(prefix);
        if len > self.max_len {
            return Err(FrameError::Oversize {
                len,
                max: self.max_len,
            });
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload).await?;
        Ok(Some(payload))
    }

    /// Write one frame: prefix, payload, flush.
    pub async fn write<W>(&self, writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        let len = payload.len() as u32;
        writer.write_all(&len.to_le_bytes()).await?;
        writer.write_all(payload).await?;
        writer.flush().await?;
        Ok(())
    }
}
