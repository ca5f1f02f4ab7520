//! Configuration for chunking and the hashing pipeline.
//!
//! - [`ChunkConfig`] - Chunk size boundaries and the Rabin polynomial
//! - [`PipelineConfig`] - Worker count and job queue depth
//!
//! # Example
//!
//! ```
//! use chunkdex::{ChunkConfig, Pol, PipelineConfig};
//!
//! // Per-deployment polynomial derived from a secret salt
//! let config = ChunkConfig::new(512 * 1024, 1024 * 1024, 8 * 1024 * 1024)?
//!     .with_polynomial(Pol::from_salt(b"repository-id")?);
//! config.validate()?;
//!
//! let pipeline = PipelineConfig::default().with_workers(4);
//! assert_eq!(pipeline.workers(), 4);
//! # Ok::<(), chunkdex::ChunkError>(())
//! ```

use std::thread;

use crate::cdc::{Pol, WINDOW_SIZE};
use crate::error::{ChunkError, Result};

/// Default minimum chunk size (512 KiB).
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 512 * 1024;

/// Default average/target chunk size (1 MiB).
pub const DEFAULT_AVG_CHUNK_SIZE: usize = 1024 * 1024;

/// Default maximum chunk size (8 MiB).
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Default polynomial.
///
/// It is public knowledge; deployments that care about boundary privacy pick
/// their own with [`Pol::random`] or [`Pol::from_salt`].
pub const DEFAULT_POLYNOMIAL: Pol = Pol::new(0x3DA3_358B_4DC1_73);

/// Smallest accepted polynomial degree (the digest must hold a full byte).
const MIN_POL_DEGREE: i32 = 9;

/// Largest accepted polynomial degree (`digest << 8` must fit in 64 bits).
const MAX_POL_DEGREE: i32 = 56;

/// Configuration for content-defined chunking.
///
/// Size constraints: `WINDOW_SIZE <= min_size <= avg_size <= max_size`, and
/// `avg_size` is a power of two. A boundary is placed where the low
/// `log2(avg_size)` bits of the rolling fingerprint are zero.
///
/// Changing any of these values changes chunk boundaries, and with them every
/// content id downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkConfig {
    min_size: usize,
    avg_size: usize,
    max_size: usize,
    polynomial: Pol,
}

impl ChunkConfig {
    /// Creates a new configuration using [`DEFAULT_POLYNOMIAL`].
    ///
    /// Returns error if the sizes violate the constraints above.
    pub fn new(min_size: usize, avg_size: usize, max_size: usize) -> Result<Self> {
        let config = Self {
            min_size,
            avg_size,
            max_size,
            polynomial: DEFAULT_POLYNOMIAL,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the minimum chunk size.
    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = size;
        self
    }

    /// Sets the average chunk size.
    pub fn with_avg_size(mut self, size: usize) -> Self {
        self.avg_size = size;
        self
    }

    /// Sets the maximum chunk size.
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Sets the Rabin polynomial.
    pub fn with_polynomial(mut self, polynomial: Pol) -> Self {
        self.polynomial = polynomial;
        self
    }

    /// Returns the minimum chunk size.
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Returns the average chunk size.
    pub fn avg_size(&self) -> usize {
        self.avg_size
    }

    /// Returns the maximum chunk size.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the Rabin polynomial.
    pub fn polynomial(&self) -> Pol {
        self.polynomial
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<()> {
        if self.min_size == 0 || self.avg_size == 0 || self.max_size == 0 {
            return Err(ChunkError::InvalidConfig {
                message: "chunk sizes must be non-zero",
            });
        }

        if self.min_size < WINDOW_SIZE {
            return Err(ChunkError::InvalidConfig {
                message: "min_size cannot be smaller than the rolling hash window",
            });
        }

        if self.min_size > self.avg_size {
            return Err(ChunkError::InvalidConfig {
                message: "min_size cannot be greater than avg_size",
            });
        }

        if self.avg_size > self.max_size {
            return Err(ChunkError::InvalidConfig {
                message: "avg_size cannot be greater than max_size",
            });
        }

        if !self.avg_size.is_power_of_two() {
            return Err(ChunkError::InvalidConfig {
                message: "avg_size must be a power of 2",
            });
        }

        let deg = self.polynomial.deg();
        if !(MIN_POL_DEGREE..=MAX_POL_DEGREE).contains(&deg) {
            return Err(ChunkError::InvalidConfig {
                message: "polynomial degree must be between 9 and 56",
            });
        }

        if !self.polynomial.irreducible() {
            return Err(ChunkError::InvalidConfig {
                message: "polynomial must be irreducible",
            });
        }

        Ok(())
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_CHUNK_SIZE,
            avg_size: DEFAULT_AVG_CHUNK_SIZE,
            max_size: DEFAULT_MAX_CHUNK_SIZE,
            polynomial: DEFAULT_POLYNOMIAL,
        }
    }
}

/// Configuration for the parallel hashing pipeline.
///
/// At most `queue_depth + workers` chunks are in flight at any time, which
/// bounds the memory held by pooled buffers to roughly that many chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineConfig {
    workers: usize,
    queue_depth: usize,
}

impl PipelineConfig {
    /// Creates a new pipeline configuration.
    pub fn new(workers: usize, queue_depth: usize) -> Result<Self> {
        let config = Self {
            workers,
            queue_depth,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the number of hashing workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the number of chunks that may wait for a free worker.
    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Returns the number of hashing workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the job queue depth.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// Validates the current configuration.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ChunkError::InvalidConfig {
                message: "workers must be non-zero",
            });
        }

        if self.queue_depth == 0 {
            return Err(ChunkError::InvalidConfig {
                message: "queue_depth must be non-zero",
            });
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            queue_depth: workers * 2,
        }
    }
}
