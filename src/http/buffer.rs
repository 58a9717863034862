//! Append-only request buffer with a hard ceiling.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Growing the buffer would exceed the configured request ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("request exceeds {limit} bytes")]
pub struct RequestTooLarge {
    pub limit: usize,
}

/// Bytes received on one connection so far.
///
/// Bytes are only ever appended; offsets into the filled region stay valid
/// across growth.
#[derive(Debug)]
pub struct GrowableBuffer {
    data: Vec<u8>,
    chunk_size: usize,
    limit: usize,
}

impl GrowableBuffer {
    pub fn new(chunk_size: usize, limit: usize) -> Self {
        Self {
            data: Vec::with_capacity(chunk_size.min(limit)),
            chunk_size,
            limit,
        }
    }

    /// Read up to one chunk from `reader` into the tail.
    ///
    /// The ceiling is checked before any allocation happens. Returns the
    /// number of bytes read; zero means the peer closed its side.
    pub async fn read_chunk<R>(&mut self, reader: &mut R) -> std::io::Result<usize>
    where
        R: AsyncRead + Unpin,
    {
        let start = self.data.len();
        self.reserve_chunk()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::OutOfMemory, e))?;

        self.data.resize(start + self.chunk_size, 0);
        let result = reader.read(&mut self.data[start..]).await;
        let n = *result.as_ref().unwrap_or(&0);
        self.data.truncate(start + n);
        result
    }

    /// Check that one more chunk fits under the ceiling.
    pub fn reserve_chunk(&self) -> Result<(), RequestTooLarge> {
        if self.data.len() + self.chunk_size > self.limit {
            return Err(RequestTooLarge { limit: self.limit });
        }
        Ok(())
    }

    /// Everything received so far.
    pub fn filled(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
