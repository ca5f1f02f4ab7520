//! Async streaming support for chunking.
//!
//! - [`chunk_async`] - Creates an async stream of chunks from a
//!   `futures_io::AsyncRead`, drawing chunk buffers from a [`BufferPool`](crate::BufferPool)
//!
//! This module requires the `async-io` feature to be enabled.

mod stream;

pub use stream::{ChunkStream, chunk_async};
