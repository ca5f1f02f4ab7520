//! Chunk, hash and index a whole stream.
//!
//! [`Pipeline::file_chunks`] reads the stream on the calling thread, hashes
//! chunks on a pool of scoped worker threads and returns a [`FileChunks`]:
//! the ordered chunk records, a [`ChunkIndex`] and the composite hash of the
//! stream. Results are identical to a sequential run whatever the worker
//! count or the order in which workers finish.
//!
//! # Example
//!
//! ```
//! use chunkdex::{ChunkConfig, Pipeline, PipelineConfig};
//! use std::io::Cursor;
//!
//! let pipeline = Pipeline::new(ChunkConfig::new(1024, 4096, 16384)?)?
//!     .with_config(PipelineConfig::new(2, 4)?);
//!
//! let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
//! let file = pipeline.file_chunks(Cursor::new(&data))?;
//!
//! assert_eq!(file.total_len(), data.len() as u64);
//! println!("{} chunks, composite {}", file.len(), file.composite_hex());
//! # Ok::<(), chunkdex::ChunkError>(())
//! ```

mod aggregate;
mod workers;

pub use aggregate::{ChunkIndex, FileChunks};

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::buffer::BufferPool;
use crate::chunker::Chunker;
use crate::config::{ChunkConfig, PipelineConfig};
use crate::error::Result;
use crate::hash::{Blake3Hasher, ContentHasher};
use aggregate::Aggregator;

/// A cooperative cancellation signal.
///
/// Clones share the same flag. The pipeline checks it between chunks; work
/// already handed to workers completes before the pipeline returns
/// [`ChunkError::Cancelled`](crate::ChunkError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Creates a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once [`CancelFlag::cancel`] was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Chunker, buffer pool, hasher and worker settings for indexing streams.
///
/// The default hasher is BLAKE3. A pipeline can index any number of streams,
/// also from several threads at once.
///
/// # Buffer pool
///
/// [`Pipeline::new`] draws chunk buffers from the process-wide
/// [`BufferPool::shared`], which is sized for the default minimum chunk size.
/// Use [`Pipeline::new_with_pool`] (or [`Pipeline::with_pool`]) to give the
/// pipeline its own pool, for example one sized to a custom `min_size` or
/// one whose statistics should not mix with other users.
#[derive(Debug, Clone)]
pub struct Pipeline<H = Blake3Hasher> {
    chunker: Chunker,
    pool: BufferPool,
    config: PipelineConfig,
    hasher: H,
}

impl Pipeline {
    /// Creates a pipeline with the default hasher and worker settings that
    /// draws buffers from the process-wide [`BufferPool::shared`].
    pub fn new(chunk_config: ChunkConfig) -> Result<Self> {
        Self::new_with_pool(chunk_config, BufferPool::shared())
    }

    /// Creates a pipeline with the default hasher and worker settings that
    /// draws buffers from `pool`.
    pub fn new_with_pool(chunk_config: ChunkConfig, pool: BufferPool) -> Result<Self> {
        Ok(Self {
            chunker: Chunker::new(chunk_config)?,
            pool,
            config: PipelineConfig::default(),
            hasher: Blake3Hasher::new(),
        })
    }
}

impl<H: ContentHasher> Pipeline<H> {
    /// Uses `pool` for chunk buffers.
    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = pool;
        self
    }

    /// Sets worker count and queue depth.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the content hasher.
    pub fn with_hasher<H2: ContentHasher>(self, hasher: H2) -> Pipeline<H2> {
        Pipeline {
            chunker: self.chunker,
            pool: self.pool,
            config: self.config,
            hasher,
        }
    }

    /// Returns the chunker.
    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Returns the buffer pool.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Returns the worker settings.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the content hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Chunks, hashes and indexes `reader` to its end.
    ///
    /// Any failure aborts the whole stream; no partial result is returned.
    pub fn file_chunks<R: Read>(&self, reader: R) -> Result<FileChunks> {
        self.file_chunks_with_cancel(reader, &CancelFlag::new())
    }

    /// Like [`Pipeline::file_chunks`], stopping early once `cancel` is set.
    pub fn file_chunks_with_cancel<R: Read>(&self, reader: R, cancel: &CancelFlag) -> Result<FileChunks> {
        self.config.validate()?;

        tracing::debug!(
            workers = self.config.workers(),
            queue_depth = self.config.queue_depth(),
            "starting chunk pipeline"
        );

        let mut agg = Aggregator::new();
        agg.start();

        let chunks = self.chunker.chunk(reader, &self.pool);
        let result = workers::run(chunks, &self.hasher, &self.config, cancel, &mut agg)
            .and_then(|()| agg.finish(&self.hasher));

        match result {
            Ok(file) => {
                tracing::debug!(
                    chunks = file.len(),
                    indexed = file.index.len(),
                    bytes = file.total_len(),
                    composite = %file.composite,
                    "chunk pipeline finished"
                );
                Ok(file)
            }
            Err(e) => {
                agg.fail(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChunkError;
    use std::io::{self, Cursor};

    fn pipeline() -> Pipeline {
        Pipeline::new_with_pool(ChunkConfig::new(256, 1024, 4096).unwrap(), BufferPool::new(256, 8))
            .unwrap()
            .with_config(PipelineConfig::new(3, 2).unwrap())
    }

    /// Sets the flag once `after` bytes have been read.
    struct CancelAfter {
        inner: Cursor<Vec<u8>>,
        flag: CancelFlag,
        after: u64,
    }

    impl Read for CancelAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inner.position() >= self.after {
                self.flag.cancel();
            }
            let n = buf.len().min(1000);
            self.inner.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_pool_injection() {
        let config = ChunkConfig::new(256, 1024, 4096).unwrap();

        let shared = Pipeline::new(config).unwrap();
        assert_eq!(shared.pool().buffer_size(), BufferPool::shared().buffer_size());

        let own = BufferPool::new(256, 2);
        let p = Pipeline::new_with_pool(config, own.clone()).unwrap();
        p.file_chunks(Cursor::new(vec![9u8; 5000])).unwrap();
        assert!(own.stats().misses > 0, "chunks came from the injected pool");
    }

    #[test]
    fn test_empty_stream() {
        let file = pipeline().file_chunks(io::empty()).unwrap();
        assert!(file.is_empty());
        assert_eq!(file.total_len(), 0);
        assert_eq!(file.composite.as_bytes(), blake3::hash(b"").as_bytes());
    }

    #[test]
    fn test_invalid_pipeline_config() {
        let p = pipeline().with_config(PipelineConfig::default().with_workers(0));
        assert!(matches!(
            p.file_chunks(io::empty()),
            Err(ChunkError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_cancel_mid_stream() {
        let data = vec![0x42u8; 600_000];
        let p = pipeline();
        let flag = CancelFlag::new();
        let reader = CancelAfter {
            inner: Cursor::new(data),
            flag: flag.clone(),
            after: 100_000,
        };

        let err = p.file_chunks_with_cancel(reader, &flag).unwrap_err();
        assert!(matches!(err, ChunkError::Cancelled));
        assert!(p.pool().stats().idle <= 8);
    }

    #[test]
    fn test_with_hasher_changes_ids() {
        let data = vec![7u8; 10_000];
        let plain = pipeline().file_chunks(Cursor::new(&data)).unwrap();
        let keyed = pipeline()
            .with_hasher(Blake3Hasher::keyed([1u8; 32]))
            .file_chunks(Cursor::new(&data))
            .unwrap();

        assert_eq!(plain.len(), keyed.len());
        assert_ne!(plain.composite, keyed.composite);
    }
}
