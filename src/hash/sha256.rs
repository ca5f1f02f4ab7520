//! SHA-256-based content hashing.

use sha2::{Digest, Sha256};

use super::ContentHasher;
use crate::chunk::ContentId;

/// A hasher that computes SHA-256 content ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn content_id(&self, data: &[u8]) -> ContentId {
        ContentId::new(Sha256::digest(data).into())
    }

    fn composite_id<'a, I>(&self, ids: I) -> ContentId
    where
        I: IntoIterator<Item = &'a ContentId>,
    {
        let mut state = Sha256::new();
        for id in ids {
            state.update(id.as_bytes());
        }
        ContentId::new(state.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let id = Sha256Hasher.content_id(b"");
        assert_eq!(
            id.to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_composite_helper_matches_hasher() {
        let ids = [Sha256Hasher.content_id(b"a"), Sha256Hasher.content_id(b"b")];
        let mut concatenated = Vec::new();
        concatenated.extend_from_slice(ids[0].as_bytes());
        concatenated.extend_from_slice(ids[1].as_bytes());

        let expected = Sha256Hasher.content_id(&concatenated);
        assert_eq!(crate::hash::composite_hash_sha256(&ids), expected);
        assert_eq!(Sha256Hasher.composite_id(&ids), expected);
    }

    #[test]
    fn test_composite_of_nothing() {
        let empty: [&ContentId; 0] = [];
        assert_eq!(Sha256Hasher.composite_id(empty), Sha256Hasher.content_id(b""));
    }
}
