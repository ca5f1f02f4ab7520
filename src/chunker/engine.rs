//! Chunker - configured boundary detector.
//!
//! A [`Chunker`] validates a [`ChunkConfig`] once and builds the Rabin lookup
//! tables for its polynomial. It is cheap to clone and hands out independent
//! scanners for any number of streams:
//!
//! - [`Chunker::chunk`] - Iterator over a [`std::io::Read`] source, chunk data
//!   drawn from a [`BufferPool`]
//! - [`Chunker::chunk_bytes`] - Zero-copy split of in-memory data
//!
//! # Example
//!
//! ```
//! use chunkdex::{BufferPool, ChunkConfig, Chunker};
//! use std::io::Cursor;
//!
//! let chunker = Chunker::new(ChunkConfig::new(1024, 4096, 16384)?)?;
//! let pool = BufferPool::new(1024, 8);
//!
//! let data = vec![7u8; 50_000];
//! let mut total = 0;
//! for chunk in chunker.chunk(Cursor::new(&data), &pool) {
//!     total += chunk?.len();
//! }
//! assert_eq!(total, data.len());
//! # Ok::<(), chunkdex::ChunkError>(())
//! ```

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;

use super::ChunkIter;
use crate::buffer::BufferPool;
use crate::cdc::{RabinCdc, Tables};
use crate::chunk::ChunkSlice;
use crate::config::ChunkConfig;
use crate::error::Result;

/// A content-defined chunker for one configuration.
///
/// # Determinism
///
/// Identical byte streams produce identical chunk boundaries, regardless of
/// how the reader splits its reads. A boundary depends only on the last
/// [`WINDOW_SIZE`](crate::WINDOW_SIZE) bytes and the distance to the previous
/// boundary, so an edit only moves boundaries near it.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkConfig,
    tables: Arc<Tables>,
}

impl Chunker {
    /// Creates a new chunker, validating the configuration.
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            min_size = config.min_size(),
            avg_size = config.avg_size(),
            max_size = config.max_size(),
            "building rabin tables"
        );

        Ok(Self {
            tables: Arc::new(Tables::new(config.polynomial())),
            config,
        })
    }

    /// Returns the configuration used by this chunker.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Returns a fresh rolling hash scanner for this configuration.
    pub fn cdc(&self) -> RabinCdc {
        RabinCdc::new(
            Arc::clone(&self.tables),
            self.config.min_size(),
            self.config.avg_size(),
            self.config.max_size(),
        )
    }

    /// Creates a chunking iterator from a reader.
    ///
    /// Chunk data is drawn from `pool` and returns to it when each chunk is
    /// dropped.
    pub fn chunk<R: Read>(&self, reader: R, pool: &BufferPool) -> ChunkIter<R> {
        ChunkIter::new(reader, self.cdc(), pool.clone())
    }

    /// Chunks an in-memory buffer without copying.
    ///
    /// Produces the same boundaries as [`Chunker::chunk`] over the same bytes.
    ///
    /// # Example
    ///
    /// ```
    /// use chunkdex::{ChunkConfig, Chunker};
    ///
    /// let chunker = Chunker::new(ChunkConfig::new(64, 256, 1024)?)?;
    /// let chunks = chunker.chunk_bytes(&b"hello world"[..]);
    ///
    /// assert_eq!(chunks.len(), 1);
    /// assert_eq!(chunks[0].data, &b"hello world"[..]);
    /// # Ok::<(), chunkdex::ChunkError>(())
    /// ```
    pub fn chunk_bytes(&self, data: impl Into<Bytes>) -> Vec<ChunkSlice> {
        let data = data.into();
        let mut cdc = self.cdc();
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < data.len() {
            match cdc.find_boundary(&data[start..]) {
                Some(len) => {
                    chunks.push(ChunkSlice {
                        start: start as u64,
                        cut: cdc.last_cut(),
                        data: data.slice(start..start + len),
                    });
                    start += len;
                }
                None => {
                    // Trailing data (force boundary at end)
                    chunks.push(ChunkSlice {
                        start: start as u64,
                        cut: 0,
                        data: data.slice(start..),
                    });
                    break;
                }
            }
        }

        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        let config = ChunkConfig::default();
        Self {
            tables: Arc::new(Tables::new(config.polynomial())),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdc::Pol;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    fn small_config() -> ChunkConfig {
        ChunkConfig::new(256, 1024, 4096).unwrap()
    }

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(42).fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = ChunkConfig::default().with_min_size(0);
        assert!(Chunker::new(config).is_err());
    }

    #[test]
    fn test_chunk_bytes_empty() {
        let chunker = Chunker::default();
        assert!(chunker.chunk_bytes(Bytes::new()).is_empty());
    }

    #[test]
    fn test_chunk_bytes_below_min_size() {
        let chunker = Chunker::new(small_config()).unwrap();
        let chunks = chunker.chunk_bytes(vec![0xAAu8; 100]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[0].start, 0);
    }

    #[test]
    fn test_chunk_bytes_offsets_contiguous() {
        let chunker = Chunker::new(small_config()).unwrap();
        let data = pseudo_random(100_000);
        let chunks = chunker.chunk_bytes(data.clone());
        assert!(chunks.len() > 10);

        let mut expected = 0u64;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.start, expected);
            assert!(chunk.len() <= 4096);
            if i < chunks.len() - 1 {
                assert!(chunk.len() >= 256);
            }
            expected += chunk.len() as u64;
        }
        assert_eq!(expected, data.len() as u64);
    }

    #[test]
    fn test_chunk_bytes_is_zero_copy() {
        let chunker = Chunker::new(small_config()).unwrap();
        let original = Bytes::from(pseudo_random(20_000));
        for chunk in chunker.chunk_bytes(original.clone()) {
            let begin = original.as_ptr() as usize;
            let ptr = chunk.data.as_ptr() as usize;
            assert!(ptr >= begin && ptr + chunk.len() <= begin + original.len());
        }
    }

    #[test]
    fn test_polynomial_changes_boundaries() {
        let data = pseudo_random(200_000);
        let a = Chunker::new(small_config()).unwrap().chunk_bytes(data.clone());
        let other = small_config().with_polynomial(Pol::from_salt(b"other").unwrap());
        let b = Chunker::new(other).unwrap().chunk_bytes(data);

        let starts_a: Vec<_> = a.iter().map(|c| c.start).collect();
        let starts_b: Vec<_> = b.iter().map(|c| c.start).collect();
        assert_ne!(starts_a, starts_b);
    }
}
