use ichnaea_types::ContentHash;
use sha2::{Digest, Sha256};

/// Incremental SHA-256 accumulator producing a [`ContentHash`].
///
/// Feed it the exact chunks that are written to storage; the final hash is
/// identical to `ContentHash::compute` over the concatenated bytes.
#[derive(Clone, Default)]
pub struct ContentDigest {
    inner: Sha256,
    len: u64,
}

impl ContentDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Number of bytes absorbed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Consume the accumulator and return the content hash.
    pub fn finalize(self) -> ContentHash {
        let digest = self.inner.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        ContentHash::from_digest(out)
    }
}

impl std::fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentDigest").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_digest_matches_empty_hash() {
        let digest = ContentDigest::new();
        assert!(digest.is_empty());
        assert_eq!(digest.finalize(), ContentHash::compute(b""));
    }

    #[test]
    fn counts_bytes() {
        let mut digest = ContentDigest::new();
        digest.update(b"a,b\n");
        digest.update(b"1,2\n");
        assert_eq!(digest.len(), 8);
        assert_eq!(digest.finalize(), ContentHash::compute(b"a,b\n1,2\n"));
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_hash(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            split in 1usize..64,
        ) {
            let mut digest = ContentDigest::new();
            for chunk in data.chunks(split) {
                digest.update(chunk);
            }
            prop_assert_eq!(digest.finalize(), ContentHash::compute(&data));
        }
    }
}
