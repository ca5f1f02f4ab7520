//! Polynomials over GF(2).
//!
//! A [`Pol`] stores the coefficients of a polynomial in the bits of a `u64`:
//! bit `i` is the coefficient of `x^i`. Addition is XOR and multiplication is
//! carry-less. An irreducible polynomial defines the Rabin fingerprint used
//! for boundary detection, so picking a private one per deployment keeps the
//! boundary function from being a public fingerprint oracle.

use std::fmt;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::{ChunkError, Result};

/// Degree of polynomials produced by [`Pol::derive`].
pub const DERIVED_DEGREE: i32 = 53;

/// Candidates tried before giving up on finding an irreducible polynomial.
const MAX_DERIVE_TRIES: usize = 1_000_000;

/// A polynomial over GF(2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(transparent)
)]
pub struct Pol(u64);

impl Pol {
    /// Creates a polynomial from its coefficient bits.
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the coefficient bits.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns the degree, or `-1` for the zero polynomial.
    pub const fn deg(self) -> i32 {
        if self.0 == 0 {
            -1
        } else {
            63 - self.0.leading_zeros() as i32
        }
    }

    /// Returns `self + other`.
    #[allow(clippy::should_implement_trait)]
    pub const fn add(self, other: Pol) -> Pol {
        Pol(self.0 ^ other.0)
    }

    /// Returns `self * other`, or `None` if the product does not fit in 64 bits.
    pub fn checked_mul(self, other: Pol) -> Option<Pol> {
        if self.0 == 0 || other.0 == 0 {
            return Some(Pol(0));
        }
        if self.deg() + other.deg() > 63 {
            return None;
        }

        let mut res = 0u64;
        let mut f = other.0;
        let mut shifted = self.0;
        while f != 0 {
            if f & 1 == 1 {
                res ^= shifted;
            }
            f >>= 1;
            shifted <<= 1;
        }
        Some(Pol(res))
    }

    /// Returns `self mod d`.
    ///
    /// # Panics
    ///
    /// Panics if `d` is the zero polynomial.
    pub fn modulo(self, d: Pol) -> Pol {
        assert!(d.0 != 0, "polynomial division by zero");

        let d_deg = d.deg();
        let mut x = self;
        while x.deg() >= d_deg {
            x = x.add(Pol(d.0 << (x.deg() - d_deg)));
        }
        x
    }

    /// Returns `(self * f) mod g`.
    ///
    /// `g` must have degree below 63 so intermediate shifts cannot overflow.
    pub fn mul_mod(self, f: Pol, g: Pol) -> Pol {
        let mut a = self.modulo(g);
        let mut f = f.0;
        let mut res = 0u64;
        while f != 0 {
            if f & 1 == 1 {
                res ^= a.0;
            }
            f >>= 1;
            a = Pol(a.0 << 1).modulo(g);
        }
        Pol(res)
    }

    /// Returns the greatest common divisor of `self` and `other`.
    pub fn gcd(self, other: Pol) -> Pol {
        let (mut a, mut b) = (self, other);
        while b.0 != 0 {
            let r = a.modulo(b);
            a = b;
            b = r;
        }
        a
    }

    /// Returns true if the polynomial cannot be factored over GF(2).
    ///
    /// Uses Ben-Or's test: `p` of degree `d` is irreducible iff
    /// `gcd(p, x^(2^i) - x mod p) == 1` for every `i` in `1..=d/2`.
    pub fn irreducible(self) -> bool {
        let deg = self.deg();
        if deg < 1 {
            return false;
        }

        (1..=deg / 2).all(|i| self.gcd(qp(i as u32, self)) == Pol(1))
    }

    /// Draws random degree-53 polynomials from `rng` until one is irreducible.
    pub fn derive<R: RngCore + ?Sized>(rng: &mut R) -> Result<Pol> {
        for _ in 0..MAX_DERIVE_TRIES {
            // Degree exactly 53 and a constant term, otherwise x divides it.
            let bits = (rng.next_u64() & ((1 << (DERIVED_DEGREE + 1)) - 1))
                | (1 << DERIVED_DEGREE)
                | 1;
            let pol = Pol(bits);
            if pol.irreducible() {
                return Ok(pol);
            }
        }

        Err(ChunkError::InvalidConfig {
            message: "unable to find an irreducible polynomial",
        })
    }

    /// Returns a fresh random irreducible polynomial.
    pub fn random() -> Result<Pol> {
        Self::derive(&mut rand::rng())
    }

    /// Derives an irreducible polynomial from a deployment salt.
    ///
    /// The same salt always yields the same polynomial.
    pub fn from_salt(salt: &[u8]) -> Result<Pol> {
        let seed = *blake3::hash(salt).as_bytes();
        let mut rng = ChaCha20Rng::from_seed(seed);
        Self::derive(&mut rng)
    }

    /// Renders the polynomial as a sum of powers, e.g. `x^3+x+1`.
    pub fn expand(self) -> String {
        if self.0 == 0 {
            return "0".to_string();
        }

        (0..=self.deg())
            .rev()
            .filter(|i| self.0 & (1 << i) != 0)
            .map(|i| match i {
                0 => "1".to_string(),
                1 => "x".to_string(),
                _ => format!("x^{i}"),
            })
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Computes `(x^(2^p) - x) mod g`.
fn qp(p: u32, g: Pol) -> Pol {
    let x = Pol(2);
    let mut res = x.modulo(g);
    for _ in 0..p {
        res = res.mul_mod(res, g);
    }
    res.add(x).modulo(g)
}

impl From<u64> for Pol {
    fn from(bits: u64) -> Self {
        Self(bits)
    }
}

impl fmt::Display for Pol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Pol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
