//! Boundary detection over byte streams.
//!
//! - [`Chunker`] - Validated configuration plus Rabin lookup tables
//! - [`ChunkIter`] - Iterator that yields chunks from a [`std::io::Read`] source

mod engine;
mod iter;

pub use engine::Chunker;
pub use iter::{ChunkIter, READ_BUFFER_SIZE};
