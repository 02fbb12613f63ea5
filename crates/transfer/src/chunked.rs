use std::io::SeekFrom;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// A contiguous byte range of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the payload.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
}

impl Chunk {
    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }
}

/// Rounds `chunk_size` down to a multiple of the remote's granularity.
///
/// Never returns less than one granule. Without a granularity the size
/// is used as is.
pub fn align_chunk_size(chunk_size: usize, granularity: Option<u64>) -> usize {
    match granularity {
        Some(g) if g > 0 => {
            let g = usize::try_from(g).unwrap_or(usize::MAX);
            std::cmp::max(chunk_size / g, 1).saturating_mul(g)
        }
        _ => chunk_size,
    }
}

/// Reads a seekable payload in fixed-size chunks starting at any offset.
///
/// Every read addresses an absolute offset, so after a partial
/// acknowledgment the next chunk simply starts where the remote stopped.
pub struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    total_size: u64,
    position: Option<u64>,
}

impl<R> ChunkReader<R>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    /// Wraps `source`, declared to hold `total_size` bytes.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(source: R, chunk_size: usize, total_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            source,
            chunk_size,
            total_size,
            position: None,
        }
    }

    /// Reads the chunk beginning at `offset`.
    ///
    /// At `offset == total_size` the chunk is empty; that is the finalizing
    /// exchange for an empty payload or a fully confirmed one.
    pub async fn chunk_at(&mut self, offset: u64) -> Result<Chunk, TransferError> {
        if offset > self.total_size {
            return Err(TransferError::InvalidOffset {
                offset,
                total: self.total_size,
            });
        }

        let len = std::cmp::min(self.chunk_size as u64, self.total_size - offset) as usize;
        let mut data = vec![0u8; len];
        if len > 0 {
            if self.position != Some(offset) {
                self.source.seek(SeekFrom::Start(offset)).await?;
            }
            // Unknown until the read succeeds; a short source fails here.
            self.position = None;
            self.source.read_exact(&mut data).await?;
            self.position = Some(offset + len as u64);
        }

        Ok(Chunk { offset, data })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }
}
