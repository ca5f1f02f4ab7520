//! Rabin fingerprint rolling hash and boundary detection.
//!
//! The fingerprint of the last [`WINDOW_SIZE`] bytes is maintained modulo an
//! irreducible polynomial. Sliding a byte out of the window and a byte in are
//! both single table lookups:
//!
//! - `out[b]` is the fingerprint of `b` followed by `WINDOW_SIZE - 1` zero
//!   bytes. XOR-ing it into the digest cancels the oldest byte.
//! - `modt[b]` combines `(b << deg) mod pol` with `b << deg`, so one XOR both
//!   reduces the digest and clears the 8 bits that overflowed past `deg`.
//!
//! A boundary is declared when the low `log2(avg_size)` bits of the digest are
//! all zero, or when the chunk reaches `max_size`. No boundary is considered
//! before `min_size`, and the first `min_size - WINDOW_SIZE` bytes of each
//! chunk are not hashed at all since they can never affect the cut.

use std::sync::Arc;

use super::Pol;

/// Number of bytes in the sliding window.
pub const WINDOW_SIZE: usize = 64;

/// Precomputed lookup tables for one polynomial.
#[derive(Debug)]
pub(crate) struct Tables {
    out: [u64; 256],
    modt: [u64; 256],
    pol_shift: u32,
}

impl Tables {
    /// Builds the tables for `pol`, which must be irreducible with degree in `9..=56`.
    pub(crate) fn new(pol: Pol) -> Self {
        let deg = pol.deg() as u32;
        let mut out = [0u64; 256];
        let mut modt = [0u64; 256];

        for b in 0..256usize {
            let mut h = append_byte(Pol::new(0), b as u8, pol);
            for _ in 0..WINDOW_SIZE - 1 {
                h = append_byte(h, 0, pol);
            }
            out[b] = h.bits();

            let high = (b as u64) << deg;
            modt[b] = Pol::new(high).modulo(pol).bits() | high;
        }

        Self {
            out,
            modt,
            pol_shift: deg - 8,
        }
    }
}

fn append_byte(hash: Pol, b: u8, pol: Pol) -> Pol {
    Pol::new((hash.bits() << 8) | b as u64).modulo(pol)
}

/// Rabin rolling hash state.
///
/// Holds the window of the chunk currently being scanned. Feed bytes with
/// [`RabinCdc::find_boundary`]; the state resets itself after every cut, so
/// the same instance scans a whole stream.
///
/// # Example
///
/// ```
/// use chunkdex::Chunker;
///
/// let data = vec![0u8; 3 * 1024 * 1024];
/// let mut cdc = Chunker::default().cdc();
///
/// let mut rest = &data[..];
/// while let Some(n) = cdc.find_boundary(rest) {
///     println!("chunk ends after {n} more bytes");
///     rest = &rest[n..];
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RabinCdc {
    tables: Arc<Tables>,

    min_size: usize,
    max_size: usize,
    split_mask: u64,

    window: [u8; WINDOW_SIZE],
    wpos: usize,
    digest: u64,

    /// Bytes of the current chunk seen so far.
    bytes_since_boundary: usize,

    /// Bytes still to be skipped before hashing starts.
    pre: usize,

    /// Digest at the most recent boundary.
    last_cut: u64,
}

impl RabinCdc {
    /// Creates a new state. `min_size` must be at least [`WINDOW_SIZE`] and
    /// `avg_size` a power of two.
    pub(crate) fn new(tables: Arc<Tables>, min_size: usize, avg_size: usize, max_size: usize) -> Self {
        let mut cdc = Self {
            tables,
            min_size,
            max_size,
            split_mask: (avg_size as u64) - 1,
            window: [0; WINDOW_SIZE],
            wpos: 0,
            digest: 0,
            bytes_since_boundary: 0,
            pre: 0,
            last_cut: 0,
        };
        cdc.reset();
        cdc
    }

    /// Resets the state for a new chunk.
    pub fn reset(&mut self) {
        self.window = [0; WINDOW_SIZE];
        self.wpos = 0;
        self.digest = 0;
        self.bytes_since_boundary = 0;
        self.slide(1);
        self.pre = self.min_size - WINDOW_SIZE;
    }

    fn slide(&mut self, b: u8) {
        let out = self.window[self.wpos];
        self.window[self.wpos] = b;
        self.digest ^= self.tables.out[out as usize];
        self.wpos = (self.wpos + 1) % WINDOW_SIZE;
        self.digest = update_digest(self.digest, self.tables.pol_shift, &self.tables.modt, b);
    }

    /// Scans `data` and returns the number of bytes consumed up to and
    /// including a boundary, or `None` if all of `data` belongs to the
    /// current chunk.
    pub fn find_boundary(&mut self, data: &[u8]) -> Option<usize> {
        let mut consumed = 0;

        if self.pre > 0 {
            let skip = self.pre.min(data.len());
            self.pre -= skip;
            self.bytes_since_boundary += skip;
            consumed = skip;
            if self.pre > 0 {
                return None;
            }
        }

        // Hot loop works on locals and writes back once.
        let tables: &Tables = &self.tables;
        let mut digest = self.digest;
        let mut wpos = self.wpos;
        let mut count = self.bytes_since_boundary;

        for &b in &data[consumed..] {
            let out = self.window[wpos];
            self.window[wpos] = b;
            digest ^= tables.out[out as usize];
            wpos += 1;
            if wpos == WINDOW_SIZE {
                wpos = 0;
            }
            digest = update_digest(digest, tables.pol_shift, &tables.modt, b);

            count += 1;
            consumed += 1;

            if count < self.min_size {
                continue;
            }

            if digest & self.split_mask == 0 || count >= self.max_size {
                self.last_cut = digest;
                self.reset();
                return Some(consumed);
            }
        }

        self.digest = digest;
        self.wpos = wpos;
        self.bytes_since_boundary = count;
        None
    }

    /// Returns the number of bytes since the last boundary.
    pub fn bytes_since_boundary(&self) -> usize {
        self.bytes_since_boundary
    }

    /// Returns the current digest.
    pub fn digest(&self) -> u64 {
        self.digest
    }

    /// Returns the digest at the most recent boundary.
    pub fn last_cut(&self) -> u64 {
        self.last_cut
    }
}

#[inline(always)]
fn update_digest(digest: u64, pol_shift: u32, modt: &[u64; 256], b: u8) -> u64 {
    let index = ((digest >> pol_shift) & 0xff) as usize;
    ((digest << 8) | b as u64) ^ modt[index]
}
