//! Buffer management for chunk data.
//!
//! This module provides a shared, capped pool of byte buffers so that chunking
//! large streams does not allocate a fresh buffer per chunk. Buffers are
//! handed out as [`PooledBuf`] guards and return to the pool on drop.

mod pool;

pub use pool::{BufferPool, DEFAULT_MAX_BUFFERS, DEFAULT_RETAIN_FACTOR, PoolStats, PooledBuf};
