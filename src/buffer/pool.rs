//! Shared pool of reusable chunk buffers.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::config::DEFAULT_MIN_CHUNK_SIZE;

/// Default number of idle buffers a pool keeps.
pub const DEFAULT_MAX_BUFFERS: usize = 16;

/// Default retain limit of a pool, as a multiple of its buffer size.
pub const DEFAULT_RETAIN_FACTOR: usize = 4;

/// A pool of byte buffers shared between chunkers and hashing workers.
///
/// [`BufferPool::acquire`] never waits: a miss allocates a fresh buffer of
/// `buffer_size` capacity. Dropping the returned [`PooledBuf`] puts the
/// buffer back for any later caller, unless `max_buffers` are already idle,
/// in which case the allocation is freed. Buffers are cleared, not zeroed.
///
/// A buffer that grew past the pool's retain limit is freed instead of kept,
/// so idle memory never exceeds `max_buffers * retain_limit` bytes.
///
/// Cloning a pool is cheap and yields a handle to the same buffers.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_buffers: usize,
    retain_limit: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    returned: AtomicU64,
    discarded: AtomicU64,
}

/// Counters describing pool usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Acquisitions served from the free list.
    pub hits: u64,
    /// Acquisitions that had to allocate.
    pub misses: u64,
    /// Buffers put back on the free list.
    pub returned: u64,
    /// Buffers freed because the free list was full or they outgrew the
    /// retain limit.
    pub discarded: u64,
    /// Buffers currently idle in the pool.
    pub idle: usize,
}

impl BufferPool {
    /// Creates a pool handing out buffers of `buffer_size` capacity and
    /// keeping at most `max_buffers` idle.
    ///
    /// Buffers that grew beyond [`DEFAULT_RETAIN_FACTOR`] times `buffer_size`
    /// are freed on return.
    pub fn new(buffer_size: usize, max_buffers: usize) -> Self {
        Self::with_retain_limit(
            buffer_size,
            max_buffers,
            buffer_size.saturating_mul(DEFAULT_RETAIN_FACTOR),
        )
    }

    /// Creates a pool that keeps returned buffers only while their capacity
    /// is at most `retain_limit` bytes.
    ///
    /// A limit at or above the largest chunk keeps every buffer.
    pub fn with_retain_limit(buffer_size: usize, max_buffers: usize, retain_limit: usize) -> Self {
        let retain_limit = retain_limit.max(buffer_size);
        tracing::debug!(buffer_size, max_buffers, retain_limit, "creating buffer pool");
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_buffers)),
                buffer_size,
                max_buffers,
                retain_limit,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                returned: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the process-wide pool, sized for the default minimum chunk.
    ///
    /// It keeps at most [`DEFAULT_MAX_BUFFERS`] idle buffers of up to
    /// [`DEFAULT_RETAIN_FACTOR`] times [`DEFAULT_MIN_CHUNK_SIZE`] bytes each,
    /// 32 MiB in total.
    pub fn shared() -> Self {
        static SHARED: OnceLock<BufferPool> = OnceLock::new();
        SHARED
            .get_or_init(|| BufferPool::new(DEFAULT_MIN_CHUNK_SIZE, DEFAULT_MAX_BUFFERS))
            .clone()
    }

    /// Takes an empty buffer from the pool, allocating if none is idle.
    pub fn acquire(&self) -> PooledBuf {
        let reused = self.inner.free.lock().pop();
        let data = match reused {
            Some(data) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                data
            }
            None => {
                self.inner.misses.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(self.inner.buffer_size)
            }
        };

        PooledBuf {
            data,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Returns a buffer to the pool. Equivalent to dropping it.
    pub fn release(&self, buf: PooledBuf) {
        drop(buf);
    }

    /// Returns the capacity of freshly allocated buffers.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Returns the maximum number of idle buffers kept.
    pub fn max_buffers(&self) -> usize {
        self.inner.max_buffers
    }

    /// Returns the largest capacity a returned buffer may have and still be
    /// kept.
    pub fn retain_limit(&self) -> usize {
        self.inner.retain_limit
    }

    /// Returns a snapshot of the usage counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            returned: self.inner.returned.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
            idle: self.inner.free.lock().len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CHUNK_SIZE, DEFAULT_MAX_BUFFERS)
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.inner.buffer_size)
            .field("max_buffers", &self.inner.max_buffers)
            .field("retain_limit", &self.inner.retain_limit)
            .field("stats", &self.stats())
            .finish()
    }
}

impl PoolInner {
    fn put(&self, mut data: Vec<u8>) {
        if data.capacity() > self.retain_limit {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        data.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_buffers {
            free.push(data);
            self.returned.fetch_add(1, Ordering::Relaxed);
        } else {
            drop(free);
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A buffer on loan from a [`BufferPool`].
///
/// Derefs to `Vec<u8>`, so it can grow past the pool's buffer size. The
/// buffer goes back to its pool when this guard is dropped, on every exit
/// path including unwinding.
pub struct PooledBuf {
    data: Vec<u8>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledBuf {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.data
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.data));
    }
}

impl fmt::Debug for PooledBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuf")
            .field("len", &self.data.len())
            .field("capacity", &self.data.capacity())
            .finish()
    }
}
