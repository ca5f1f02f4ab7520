//! chunkdex
//!
//! Content-defined chunking and deduplication indexing for backup systems.
//!
//! `chunkdex` splits a byte stream into variable-length chunks whose
//! boundaries follow the content, identifies every chunk by a strong hash and
//! folds those ids into one composite hash for the whole stream. Identical
//! regions of different files produce identical chunks, so a backup only has
//! to store what it has not seen before.
//!
//! - [`Chunker`] - Rabin fingerprint boundary detection (sync, in-memory, async)
//! - [`BufferPool`] - Reusable chunk buffers with a bounded free list
//! - [`Pipeline`] - Parallel, order-preserving hashing into [`FileChunks`]
//!
//! The crate intentionally:
//! - does NOT store chunks
//! - does NOT walk directories
//! - does NOT talk to a network
//!
//! # Chunking
//!
//! ```no_run
//! use std::fs::File;
//! use chunkdex::{BufferPool, ChunkConfig, ChunkError, Chunker};
//!
//! fn main() -> Result<(), ChunkError> {
//!     let file = File::open("data.bin")?;
//!     let chunker = Chunker::new(ChunkConfig::default())?;
//!
//!     for chunk in chunker.chunk(file, &BufferPool::shared()) {
//!         let chunk = chunk?;
//!         println!("chunk {} bytes @ {}", chunk.len(), chunk.start);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Indexing
//!
//! ```no_run
//! use std::fs::File;
//! use chunkdex::{ChunkConfig, ChunkError, Pipeline, Pol};
//!
//! fn main() -> Result<(), ChunkError> {
//!     let config = ChunkConfig::default().with_polynomial(Pol::from_salt(b"repository-id")?);
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let file = pipeline.file_chunks(File::open("data.bin")?)?;
//!     println!("{} chunks, composite {}", file.len(), file.composite_hex());
//!     for (id, offsets) in file.index.iter() {
//!         println!("{id} {}+{}", offsets.start, offsets.length);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Async (feature = "async-io")
//!
//! ```ignore
//! use futures_util::StreamExt;
//! use chunkdex::{chunk_async, BufferPool, Chunker};
//! use futures_io::AsyncRead;
//!
//! async fn demo<R: AsyncRead + Unpin>(reader: R) -> Result<(), chunkdex::ChunkError> {
//!     let chunker = Chunker::default();
//!     let mut stream = chunk_async(reader, &chunker, &BufferPool::shared());
//!
//!     while let Some(chunk) = stream.next().await {
//!         let chunk = chunk?;
//!         println!("chunk {}", chunk.len());
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod buffer;
mod cdc;
mod chunk;
mod chunker;
mod config;
mod error;
mod hash;
mod pipeline;

#[cfg(feature = "async-io")]
mod async_stream;

pub use buffer::{BufferPool, DEFAULT_MAX_BUFFERS, DEFAULT_RETAIN_FACTOR, PoolStats, PooledBuf};
pub use cdc::{DERIVED_DEGREE, Pol, RabinCdc, WINDOW_SIZE};
pub use chunk::{Chunk, ChunkOffsets, ChunkRecord, ChunkSlice, ContentId};
pub use chunker::{ChunkIter, Chunker, READ_BUFFER_SIZE};
pub use config::{
    ChunkConfig, DEFAULT_AVG_CHUNK_SIZE, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_MIN_CHUNK_SIZE,
    DEFAULT_POLYNOMIAL, PipelineConfig,
};
pub use error::{ChunkError, Result};
pub use hash::{Blake3Hasher, ContentHasher, composite_hash};
pub use pipeline::{CancelFlag, ChunkIndex, FileChunks, Pipeline};

#[cfg(feature = "hash-sha256")]
pub use hash::{Sha256Hasher, composite_hash_sha256};

#[cfg(feature = "async-io")]
pub use async_stream::{ChunkStream, chunk_async};
