//! Strong hash implementations for chunk identity.
//!
//! - [`ContentHasher`] - Computes content ids and the composite id of a sequence
//! - [`Blake3Hasher`] - BLAKE3 implementation (default)
//! - [`Sha256Hasher`] - SHA-256 implementation (requires `hash-sha256` feature)

mod blake3;
#[cfg(feature = "hash-sha256")]
mod sha256;

pub use blake3::Blake3Hasher;
#[cfg(feature = "hash-sha256")]
pub use sha256::Sha256Hasher;

use crate::chunk::ContentId;

/// Computes content-derived identities.
///
/// Implementations are shared by all hashing workers of a pipeline, so they
/// must be `Send + Sync` and must not keep per-call state.
pub trait ContentHasher: Send + Sync {
    /// Returns the content id of `data`.
    fn content_id(&self, data: &[u8]) -> ContentId;

    /// Returns the digest of the concatenated bytes of `ids`, in order.
    fn composite_id<'a, I>(&self, ids: I) -> ContentId
    where
        I: IntoIterator<Item = &'a ContentId>;
}

impl<H: ContentHasher + ?Sized> ContentHasher for &H {
    fn content_id(&self, data: &[u8]) -> ContentId {
        (**self).content_id(data)
    }

    fn composite_id<'a, I>(&self, ids: I) -> ContentId
    where
        I: IntoIterator<Item = &'a ContentId>,
    {
        (**self).composite_id(ids)
    }
}

/// Returns the BLAKE3 composite id of an ordered content id sequence.
///
/// The composite of an empty sequence is the digest of empty input.
pub fn composite_hash<'a>(ids: impl IntoIterator<Item = &'a ContentId>) -> ContentId {
    Blake3Hasher::new().composite_id(ids)
}

/// Returns the SHA-256 composite id of an ordered content id sequence.
///
/// Pairs with ids produced by [`Sha256Hasher`].
#[cfg(feature = "hash-sha256")]
pub fn composite_hash_sha256<'a>(ids: impl IntoIterator<Item = &'a ContentId>) -> ContentId {
    Sha256Hasher.composite_id(ids)
}
