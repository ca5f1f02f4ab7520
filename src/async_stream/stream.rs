//! Async stream adapter for chunking.
//!
//! Uses `futures_io::AsyncRead`, so it works with any runtime. Boundaries are
//! identical to [`Chunker::chunk`] over the same bytes.
//!
//! # Example
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use chunkdex::{chunk_async, BufferPool, Chunker};
//! use futures_io::AsyncRead;
//!
//! async fn demo<R: AsyncRead + Unpin>(reader: R, chunker: &Chunker) -> Result<(), chunkdex::ChunkError> {
//!     let mut stream = chunk_async(reader, chunker, &BufferPool::shared());
//!
//!     while let Some(chunk) = stream.next().await {
//!         let chunk = chunk?;
//!         println!("Chunk: {} bytes @ {}", chunk.len(), chunk.start);
//!     }
//!     Ok(())
//! }
//! ```

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_core::stream::FusedStream;
use futures_io::AsyncRead;
use pin_project_lite::pin_project;

use crate::buffer::{BufferPool, PooledBuf};
use crate::cdc::RabinCdc;
use crate::chunk::Chunk;
use crate::chunker::{Chunker, READ_BUFFER_SIZE};
use crate::error::{ChunkError, Result};

pin_project! {
    /// A stream that yields chunks from an async reader.
    ///
    /// Created by [`chunk_async`]. A read error is yielded once and ends the
    /// stream; the partial chunk goes back to the pool.
    pub struct ChunkStream<R> {
        #[pin]
        reader: R,
        cdc: RabinCdc,
        pool: BufferPool,
        buf: Vec<u8>,
        bpos: usize,
        bmax: usize,
        // Chunk being accumulated across reads
        data: Option<PooledBuf>,
        offset: u64,
        finished: bool,
    }
}

impl<R> ChunkStream<R> {
    /// Returns the stream offset of the next chunk.
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

fn emit(offset: &mut u64, data: PooledBuf, cut: u64) -> Chunk {
    let length = data.len() as u64;
    let chunk = Chunk {
        start: *offset,
        length,
        cut,
        data,
    };
    tracing::trace!(start = chunk.start, length, cut, "chunk boundary");
    *offset += length;
    chunk
}

impl<R: AsyncRead> Stream for ChunkStream<R> {
    type Item = Result<Chunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.finished {
            return Poll::Ready(None);
        }

        loop {
            if *this.bpos >= *this.bmax {
                let n = match this.reader.as_mut().poll_read(cx, this.buf) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Poll::Ready(Err(e)) => {
                        *this.finished = true;
                        *this.data = None;
                        tracing::warn!(offset = *this.offset, error = %e, "read failed, aborting chunk stream");
                        return Poll::Ready(Some(Err(ChunkError::Read(e))));
                    }
                    Poll::Ready(Ok(n)) => n,
                };

                if n == 0 {
                    *this.finished = true;
                    return match this.data.take() {
                        Some(data) if !data.is_empty() => Poll::Ready(Some(Ok(emit(this.offset, data, 0)))),
                        _ => Poll::Ready(None),
                    };
                }

                *this.bpos = 0;
                *this.bmax = n;
            }

            let pool = &*this.pool;
            let data = this.data.get_or_insert_with(|| pool.acquire());
            let input = &this.buf[*this.bpos..*this.bmax];

            match this.cdc.find_boundary(input) {
                Some(n) => {
                    data.extend_from_slice(&input[..n]);
                    *this.bpos += n;
                    if let Some(data) = this.data.take() {
                        let cut = this.cdc.last_cut();
                        return Poll::Ready(Some(Ok(emit(this.offset, data, cut))));
                    }
                }
                None => {
                    data.extend_from_slice(input);
                    *this.bpos = *this.bmax;
                }
            }
        }
    }
}

impl<R: AsyncRead> FusedStream for ChunkStream<R> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

/// Creates a chunk stream from an async reader.
///
/// For tokio readers, convert with `tokio_util::compat`:
///
/// ```ignore
/// use tokio_util::compat::TokioAsyncReadCompatExt;
/// use chunkdex::{chunk_async, BufferPool, Chunker};
///
/// let file = tokio::fs::File::open("file").await?;
/// let stream = chunk_async(file.compat(), &Chunker::default(), &BufferPool::shared());
/// ```
pub fn chunk_async<R: AsyncRead>(reader: R, chunker: &Chunker, pool: &BufferPool) -> ChunkStream<R> {
    ChunkStream {
        reader,
        cdc: chunker.cdc(),
        pool: pool.clone(),
        buf: vec![0u8; READ_BUFFER_SIZE],
        bpos: 0,
        bmax: 0,
        data: None,
        offset: 0,
        finished: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkConfig;
    use futures_util::StreamExt;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn chunker() -> Chunker {
        Chunker::new(ChunkConfig::new(256, 1024, 4096).unwrap()).unwrap()
    }

    /// Async reader that fails once its data runs out.
    struct Failing<'a> {
        data: &'a [u8],
    }

    impl AsyncRead for Failing<'_> {
        fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut [u8]) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            if this.data.is_empty() {
                return Poll::Ready(Err(io::Error::other("connection reset")));
            }
            let n = buf.len().min(this.data.len());
            buf[..n].copy_from_slice(&this.data[..n]);
            this.data = &this.data[n..];
            Poll::Ready(Ok(n))
        }
    }

    #[tokio::test]
    async fn test_chunk_stream_empty() {
        let reader: &[u8] = &[];
        let pool = BufferPool::new(256, 4);
        let mut stream = chunk_async(reader, &chunker(), &pool);
        assert!(stream.next().await.is_none());
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_matches_sync_boundaries() {
        let mut data = vec![0u8; 150_000];
        StdRng::seed_from_u64(7).fill_bytes(&mut data);
        let pool = BufferPool::new(256, 4);
        let c = chunker();

        let reader: &[u8] = &data;
        let streamed: Vec<_> = chunk_async(reader, &c, &pool)
            .map(|r| r.unwrap().offsets())
            .collect()
            .await;
        let sliced: Vec<_> = c.chunk_bytes(data.clone()).iter().map(|s| s.offsets()).collect();

        assert!(streamed.len() > 10);
        assert_eq!(streamed, sliced);
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let data = vec![0x11u8; 100];
        let pool = BufferPool::new(256, 4);
        let mut stream = chunk_async(Failing { data: &data }, &chunker(), &pool);

        assert!(matches!(stream.next().await, Some(Err(ChunkError::Read(_)))));
        assert!(stream.next().await.is_none());
        assert_eq!(pool.stats().idle, 1);
    }
}
