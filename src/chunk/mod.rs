//! Chunk types.
//!
//! - [`Chunk`] - Chunk read from a stream, data on loan from a buffer pool
//! - [`ChunkSlice`] - Zero-copy chunk of in-memory data
//! - [`ChunkRecord`] / [`ChunkOffsets`] - Identity and position of a chunk
//! - [`ContentId`] - 32-byte content digest

mod data;
mod hash;

pub use data::{Chunk, ChunkOffsets, ChunkRecord, ChunkSlice};
pub use hash::ContentId;
