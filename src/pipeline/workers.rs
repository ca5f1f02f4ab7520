//! Scoped hashing workers fed through a bounded job queue.
//!
//! The calling thread reads chunks and sends them to `workers` scoped threads
//! over a channel of `queue_depth` slots, so at most `queue_depth + workers`
//! chunk buffers are out of the pool at once. Every result carries the
//! submission sequence number of its chunk; the [`Aggregator`] puts it back
//! in order.
//!
//! A worker that panics raises a shared failure flag while unwinding. The
//! reader checks it before every chunk, so one failed hash stops the stream
//! instead of waiting for the other workers to run out of input.

use std::any::Any;
use std::io::Read;
use std::thread::{self, ScopedJoinHandle};

use crossbeam_channel::{Receiver, Sender};

use super::CancelFlag;
use super::aggregate::Aggregator;
use crate::chunk::{Chunk, ChunkRecord};
use crate::chunker::ChunkIter;
use crate::config::PipelineConfig;
use crate::error::{ChunkError, Result};
use crate::hash::ContentHasher;

struct Job {
    seq: usize,
    chunk: Chunk,
}

type Outcome = (usize, ChunkRecord);

/// Chunks `chunks`, hashes every chunk on the worker pool and stores the
/// results in `agg`.
///
/// Returns after every worker has been joined, whatever the outcome.
pub(crate) fn run<R, H>(
    chunks: ChunkIter<R>,
    hasher: &H,
    config: &PipelineConfig,
    cancel: &CancelFlag,
    agg: &mut Aggregator,
) -> Result<()>
where
    R: Read,
    H: ContentHasher,
{
    let (job_tx, job_rx) = crossbeam_channel::bounded::<Job>(config.queue_depth());
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<Outcome>();
    let failed = CancelFlag::new();

    thread::scope(|s| {
        let handles: Vec<_> = (0..config.workers())
            .map(|_| {
                let jobs = job_rx.clone();
                let results = result_tx.clone();
                let failed = failed.clone();
                s.spawn(move || hash_jobs(jobs, results, hasher, failed))
            })
            .collect();
        drop(job_rx);
        drop(result_tx);

        let dispatched = dispatch(chunks, &job_tx, &result_rx, cancel, &failed, agg);

        // Closing the queue lets workers finish what was sent and exit.
        drop(job_tx);
        agg.drain();
        let joined = join_workers(handles);

        for (seq, record) in result_rx.try_iter() {
            agg.store(seq, record);
        }

        match joined {
            Err(e) => Err(e),
            Ok(()) => dispatched,
        }
    })
}

fn dispatch<R: Read>(
    mut chunks: ChunkIter<R>,
    jobs: &Sender<Job>,
    results: &Receiver<Outcome>,
    cancel: &CancelFlag,
    failed: &CancelFlag,
    agg: &mut Aggregator,
) -> Result<()> {
    loop {
        if failed.is_cancelled() {
            tracing::debug!(offset = chunks.offset(), "hash worker failed, stopping reader");
            return Err(ChunkError::HashTask {
                message: "a hash worker failed".to_string(),
            });
        }

        if cancel.is_cancelled() {
            tracing::debug!(offset = chunks.offset(), "chunk pipeline cancelled");
            return Err(ChunkError::Cancelled);
        }

        let Some(chunk) = chunks.next_chunk()? else {
            return Ok(());
        };

        let seq = agg.reserve();
        tracing::trace!(seq, start = chunk.start, length = chunk.length, "dispatching chunk");

        // A failed send hands the job back; dropping it releases the buffer.
        jobs.send(Job { seq, chunk })
            .map_err(|_| ChunkError::HashTask {
                message: "all hash workers exited".to_string(),
            })?;

        for (seq, record) in results.try_iter() {
            agg.store(seq, record);
        }
    }
}

/// Raises the failure flag if dropped during a panic.
struct FailOnUnwind(CancelFlag);

impl Drop for FailOnUnwind {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.cancel();
        }
    }
}

fn hash_jobs<H: ContentHasher>(jobs: Receiver<Job>, results: Sender<Outcome>, hasher: &H, failed: CancelFlag) {
    let _guard = FailOnUnwind(failed);

    for Job { seq, chunk } in jobs {
        let record = ChunkRecord {
            id: hasher.content_id(&chunk.data),
            start: chunk.start,
            length: chunk.length,
        };
        drop(chunk);

        if results.send((seq, record)).is_err() {
            break;
        }
    }
}

fn join_workers(handles: Vec<ScopedJoinHandle<'_, ()>>) -> Result<()> {
    let mut outcome = Ok(());

    for (worker, handle) in handles.into_iter().enumerate() {
        if let Err(payload) = handle.join() {
            let message = panic_message(payload.as_ref());
            tracing::warn!(worker, %message, "hash worker panicked");
            if outcome.is_ok() {
                outcome = Err(ChunkError::HashTask {
                    message: format!("worker {worker} panicked: {message}"),
                });
            }
        }
    }

    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::chunk::ContentId;
    use crate::config::ChunkConfig;
    use crate::hash::Blake3Hasher;
    use crate::Chunker;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::time::Duration;

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(42).fill_bytes(&mut data);
        data
    }

    fn chunker() -> Chunker {
        Chunker::new(ChunkConfig::new(256, 1024, 4096).unwrap()).unwrap()
    }

    /// Sleeps a content-dependent time before hashing.
    struct Jittery;

    impl ContentHasher for Jittery {
        fn content_id(&self, data: &[u8]) -> ContentId {
            let delay = data.first().copied().unwrap_or(0) % 4;
            thread::sleep(Duration::from_millis(delay as u64));
            Blake3Hasher::new().content_id(data)
        }

        fn composite_id<'a, I>(&self, ids: I) -> ContentId
        where
            I: IntoIterator<Item = &'a ContentId>,
        {
            Blake3Hasher::new().composite_id(ids)
        }
    }

    /// Panics on any chunk longer than 2000 bytes.
    struct Exploding;

    impl ContentHasher for Exploding {
        fn content_id(&self, data: &[u8]) -> ContentId {
            if data.len() > 2000 {
                panic!("boom");
            }
            Blake3Hasher::new().content_id(data)
        }

        fn composite_id<'a, I>(&self, ids: I) -> ContentId
        where
            I: IntoIterator<Item = &'a ContentId>,
        {
            Blake3Hasher::new().composite_id(ids)
        }
    }

    /// Panics on its first call only.
    struct FailsOnce {
        fired: AtomicBool,
    }

    impl ContentHasher for FailsOnce {
        fn content_id(&self, data: &[u8]) -> ContentId {
            if !self.fired.swap(true, Ordering::SeqCst) {
                panic!("first chunk");
            }
            thread::sleep(Duration::from_micros(200));
            Blake3Hasher::new().content_id(data)
        }

        fn composite_id<'a, I>(&self, ids: I) -> ContentId
        where
            I: IntoIterator<Item = &'a ContentId>,
        {
            Blake3Hasher::new().composite_id(ids)
        }
    }

    /// Seeded random bytes up to `len`, counting how many were read.
    struct Counting {
        rng: StdRng,
        remaining: usize,
        read: Arc<AtomicUsize>,
    }

    impl Read for Counting {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.remaining);
            self.rng.fill_bytes(&mut buf[..n]);
            self.remaining -= n;
            self.read.fetch_add(n, Ordering::SeqCst);
            Ok(n)
        }
    }

    fn run_with<H: ContentHasher>(data: &[u8], hasher: &H, workers: usize, pool: &BufferPool) -> Result<Vec<ChunkRecord>> {
        let mut agg = Aggregator::new();
        agg.start();
        let config = PipelineConfig::new(workers, 2).unwrap();
        run(chunker().chunk(Cursor::new(data), pool), hasher, &config, &CancelFlag::new(), &mut agg)?;
        Ok(agg.finish(hasher)?.records)
    }

    #[test]
    fn test_jitter_preserves_order() {
        let data = pseudo_random(200_000);
        let pool = BufferPool::new(1024, 16);

        let single = run_with(&data, &Blake3Hasher::new(), 1, &pool).unwrap();
        let parallel = run_with(&data, &Jittery, 8, &pool).unwrap();

        assert!(single.len() > 20);
        assert_eq!(single, parallel);
    }

    #[test]
    fn test_worker_panic_becomes_error() {
        let data = pseudo_random(200_000);
        let pool = BufferPool::new(1024, 16);

        let err = run_with(&data, &Exploding, 4, &pool).unwrap_err();
        match err {
            ChunkError::HashTask { message } => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_single_failed_hash_stops_reader() {
        const LEN: usize = 32 * 1024 * 1024;
        let read = Arc::new(AtomicUsize::new(0));
        let reader = Counting {
            rng: StdRng::seed_from_u64(3),
            remaining: LEN,
            read: Arc::clone(&read),
        };
        let pool = BufferPool::new(1024, 16);
        let hasher = FailsOnce {
            fired: AtomicBool::new(false),
        };

        let mut agg = Aggregator::new();
        agg.start();
        let config = PipelineConfig::new(4, 2).unwrap();
        let err = run(chunker().chunk(reader, &pool), &hasher, &config, &CancelFlag::new(), &mut agg)
            .unwrap_err();

        match err {
            ChunkError::HashTask { message } => assert!(message.contains("first chunk")),
            other => panic!("unexpected error: {other}"),
        }
        let read = read.load(Ordering::SeqCst);
        assert!(read < LEN / 4, "read {read} of {LEN} bytes after a failed hash");

        let stats = pool.stats();
        assert_eq!(stats.hits + stats.misses, stats.returned + stats.discarded);
    }

    #[test]
    fn test_fail_on_unwind_only_during_panic() {
        let flag = CancelFlag::new();
        drop(FailOnUnwind(flag.clone()));
        assert!(!flag.is_cancelled());

        let guarded = flag.clone();
        let result = thread::spawn(move || {
            let _guard = FailOnUnwind(guarded);
            panic!("unwinding");
        })
        .join();
        assert!(result.is_err());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_cancel_before_start() {
        let data = pseudo_random(50_000);
        let pool = BufferPool::new(1024, 16);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut agg = Aggregator::new();
        agg.start();
        let config = PipelineConfig::new(2, 2).unwrap();
        let err = run(chunker().chunk(Cursor::new(&data), &pool), &Blake3Hasher::new(), &config, &cancel, &mut agg)
            .unwrap_err();
        assert!(matches!(err, ChunkError::Cancelled));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
