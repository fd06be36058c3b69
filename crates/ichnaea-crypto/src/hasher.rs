/// Domain-separated BLAKE3 hasher.
///
/// The domain tag is prepended to every digest, so a record id never
/// collides with a BLAKE3 digest of the same bytes taken for another purpose.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for version records (produces commit ids).
    pub const RECORD: Self = Self {
        domain: "ichnaea-record-v1",
    };

    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }
}
