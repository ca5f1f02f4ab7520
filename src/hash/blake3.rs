//! BLAKE3-based content hashing.

use super::ContentHasher;
use crate::chunk::ContentId;

/// A hasher that computes BLAKE3 content ids.
///
/// With a key, ids are keyed hashes, so identical content only maps to the
/// same id within one deployment.
#[derive(Debug, Clone, Default)]
pub struct Blake3Hasher {
    key: Option<[u8; 32]>,
}

impl Blake3Hasher {
    /// Creates a new unkeyed hasher.
    pub fn new() -> Self {
        Self { key: None }
    }

    /// Creates a new hasher with a key for keyed hashing.
    pub fn keyed(key: [u8; 32]) -> Self {
        Self { key: Some(key) }
    }

    fn state(&self) -> blake3::Hasher {
        match &self.key {
            Some(key) => blake3::Hasher::new_keyed(key),
            None => blake3::Hasher::new(),
        }
    }

    /// Convenience method to hash data in one shot.
    pub fn hash(data: &[u8]) -> ContentId {
        ContentId::new(blake3::hash(data).into())
    }
}

impl ContentHasher for Blake3Hasher {
    fn content_id(&self, data: &[u8]) -> ContentId {
        match &self.key {
            Some(key) => ContentId::new(blake3::keyed_hash(key, data).into()),
            None => Self::hash(data),
        }
    }

    fn composite_id<'a, I>(&self, ids: I) -> ContentId
    where
        I: IntoIterator<Item = &'a ContentId>,
    {
        let mut state = self.state();
        for id in ids {
            state.update(id.as_bytes());
        }
        ContentId::new(state.finalize().into())
    }
}
