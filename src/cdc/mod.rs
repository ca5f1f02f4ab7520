//! Content-Defined Chunking (CDC) implementation.
//!
//! This module contains the core algorithm for identifying chunk boundaries
//! based on content patterns rather than fixed sizes.
//!
//! - [`Pol`] - Polynomial arithmetic over GF(2)
//! - [`RabinCdc`] - Rabin fingerprint rolling hash and boundary test

mod pol;
mod rabin;

pub use pol::{DERIVED_DEGREE, Pol};
pub use rabin::{RabinCdc, WINDOW_SIZE};

pub(crate) use rabin::Tables;
