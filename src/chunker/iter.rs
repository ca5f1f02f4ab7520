//! Synchronous chunk iterator over a [`std::io::Read`] source.

use std::io::{self, Read};
use std::iter::FusedIterator;

use crate::buffer::{BufferPool, PooledBuf};
use crate::cdc::RabinCdc;
use crate::chunk::Chunk;
use crate::error::{ChunkError, Result};

/// Size of the read buffer between the source and the rolling hash.
pub const READ_BUFFER_SIZE: usize = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Streaming,
    Finished,
    Failed,
}

/// An iterator that yields chunks from a [`std::io::Read`] source.
///
/// Created by [`Chunker::chunk`](crate::Chunker::chunk). Every chunk but the
/// last is at least `min_size` bytes; none exceeds `max_size`. Chunks are
/// contiguous and in stream order.
///
/// A read error is yielded once, after which the iterator is exhausted: the
/// partially accumulated chunk is released back to the pool and the rolling
/// hash state is discarded.
pub struct ChunkIter<R> {
    reader: R,
    cdc: RabinCdc,
    pool: BufferPool,

    buf: Vec<u8>,
    bpos: usize,
    bmax: usize,

    offset: u64,
    state: State,
}

impl<R: Read> ChunkIter<R> {
    pub(crate) fn new(reader: R, cdc: RabinCdc, pool: BufferPool) -> Self {
        Self {
            reader,
            cdc,
            pool,
            buf: vec![0u8; READ_BUFFER_SIZE],
            bpos: 0,
            bmax: 0,
            offset: 0,
            state: State::Streaming,
        }
    }

    /// Returns the stream offset of the next chunk.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the next chunk, `Ok(None)` at end of stream.
    ///
    /// Calling this again after it returned a read error yields
    /// [`ChunkError::BoundaryDetection`].
    pub fn next_chunk(&mut self) -> Result<Option<Chunk>> {
        match self.state {
            State::Finished => return Ok(None),
            State::Failed => {
                return Err(ChunkError::BoundaryDetection {
                    message: "rolling hash state lost after a read failure",
                });
            }
            State::Streaming => {}
        }

        let mut data = self.pool.acquire();

        loop {
            if self.bpos >= self.bmax {
                let n = match read_full(&mut self.reader, &mut self.buf) {
                    Ok(n) => n,
                    Err(e) => {
                        self.state = State::Failed;
                        tracing::warn!(offset = self.offset, error = %e, "read failed, aborting chunk stream");
                        return Err(ChunkError::Read(e));
                    }
                };

                if n == 0 {
                    self.state = State::Finished;
                    if data.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.emit(data, 0)));
                }

                self.bpos = 0;
                self.bmax = n;
            }

            let input = &self.buf[self.bpos..self.bmax];
            match self.cdc.find_boundary(input) {
                Some(n) => {
                    data.extend_from_slice(&input[..n]);
                    self.bpos += n;
                    let cut = self.cdc.last_cut();
                    return Ok(Some(self.emit(data, cut)));
                }
                None => {
                    data.extend_from_slice(input);
                    self.bpos = self.bmax;
                }
            }
        }
    }

    fn emit(&mut self, data: PooledBuf, cut: u64) -> Chunk {
        let length = data.len() as u64;
        let chunk = Chunk {
            start: self.offset,
            length,
            cut,
            data,
        };
        tracing::trace!(start = chunk.start, length, cut, "chunk boundary");
        self.offset += length;
        chunk
    }
}

impl<R: Read> Iterator for ChunkIter<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == State::Failed {
            return None;
        }
        self.next_chunk().transpose()
    }
}

impl<R: Read> FusedIterator for ChunkIter<R> {}

impl<R> std::fmt::Debug for ChunkIter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkIter")
            .field("offset", &self.offset)
            .field("state", &self.state)
            .field("buffered", &(self.bmax - self.bpos))
            .finish()
    }
}

/// Fills `buf` unless the reader hits end of stream first.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
