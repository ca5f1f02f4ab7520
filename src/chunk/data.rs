//! Chunk types produced by boundary detection and hashing.

use std::fmt;

use bytes::Bytes;

use super::ContentId;
use crate::buffer::PooledBuf;

/// A content-defined chunk read from a stream.
///
/// `data` is on loan from a [`BufferPool`](crate::BufferPool). Dropping the
/// chunk returns the buffer; [`Chunk::into_data`] moves the loan elsewhere.
#[derive(Debug)]
pub struct Chunk {
    /// Offset of the first byte in the stream.
    pub start: u64,

    /// Number of bytes in the chunk.
    pub length: u64,

    /// Rolling-hash digest at the boundary (zero for a forced final cut).
    pub cut: u64,

    /// The chunk bytes.
    pub data: PooledBuf,
}

impl Chunk {
    /// Returns the length of the chunk data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the chunk has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the end offset (exclusive).
    pub fn end(&self) -> u64 {
        self.start + self.length
    }

    /// Returns the chunk as a range.
    pub fn range(&self) -> std::ops::Range<u64> {
        self.start..self.end()
    }

    /// Returns the offsets of this chunk.
    pub fn offsets(&self) -> ChunkOffsets {
        ChunkOffsets {
            start: self.start,
            length: self.length,
        }
    }

    /// Consumes the chunk and returns the pooled buffer.
    pub fn into_data(self) -> PooledBuf {
        self.data
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk({} bytes @ {}, cut={:014x})", self.length, self.start, self.cut)
    }
}

/// A chunk of in-memory data, sliced without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSlice {
    /// Offset of the first byte in the input.
    pub start: u64,

    /// Rolling-hash digest at the boundary (zero for a forced final cut).
    pub cut: u64,

    /// The chunk bytes.
    pub data: Bytes,
}

impl ChunkSlice {
    /// Returns the length of the chunk data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the chunk has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the offsets of this chunk.
    pub fn offsets(&self) -> ChunkOffsets {
        ChunkOffsets {
            start: self.start,
            length: self.data.len() as u64,
        }
    }
}

/// Position of a chunk within its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkOffsets {
    /// Offset of the first byte.
    pub start: u64,
    /// Number of bytes.
    pub length: u64,
}

/// The identity and position of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkRecord {
    /// Content id of the chunk bytes.
    pub id: ContentId,
    /// Offset of the first byte.
    pub start: u64,
    /// Number of bytes.
    pub length: u64,
}

impl ChunkRecord {
    /// Returns the offsets of this chunk.
    pub fn offsets(&self) -> ChunkOffsets {
        ChunkOffsets {
            start: self.start,
            length: self.length,
        }
    }
}

impl fmt::Display for ChunkRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}+{}", self.id, self.start, self.length)
    }
}
