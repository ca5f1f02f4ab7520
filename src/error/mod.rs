//! Error types for chunkdex.

/// Errors that can occur while chunking and indexing a stream.
///
/// Any error aborts the whole operation. Chunking is not resumable, so the
/// caller has to restart from the beginning of the stream.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// An I/O error occurred while reading source bytes.
    #[error("stream read error: {0}")]
    Read(#[from] std::io::Error),

    /// The rolling-hash state is unusable, typically after a truncated stream.
    #[error("boundary detection error: {message}")]
    BoundaryDetection {
        /// Description of the broken state.
        message: &'static str,
    },

    /// A concurrent hashing unit failed or never delivered its result.
    #[error("hash task error: {message}")]
    HashTask {
        /// Description of the failure.
        message: String,
    },

    /// Invalid configuration parameter.
    #[error("invalid config: {message}")]
    InvalidConfig {
        /// Description of what was invalid.
        message: &'static str,
    },

    /// The operation observed a cancellation request.
    #[error("operation cancelled")]
    Cancelled,
}

/// Shorthand for results carrying a [`ChunkError`].
pub type Result<T, E = ChunkError> = std::result::Result<T, E>;
