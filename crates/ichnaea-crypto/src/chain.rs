use crate::hasher::ContentHasher;

/// Trait for records that participate in a parent-linked chain.
pub trait ChainLink {
    /// The record's own id.
    fn link_id(&self) -> [u8; 32];
    /// The parent record's id (None for the first record of a chain).
    fn parent_id(&self) -> Option<[u8; 32]>;
    /// 1-based position in the chain.
    fn seq(&self) -> u64;
    /// Canonical payload bytes the id was computed from.
    fn payload_bytes(&self) -> Vec<u8>;
}

/// Parent-linked chain verifier.
///
/// Verifies that a sequence of records forms a valid linear chain: sequence
/// numbers count up from 1, each record's parent matches the previous
/// record's id, and each id is the record-domain hash of its payload.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of records.
    ///
    /// Checks:
    /// 1. First record has no parent
    /// 2. Sequence numbers are contiguous starting at 1
    /// 3. Each subsequent record's parent matches the previous record's id
    /// 4. Each record's id is correct for its payload
    pub fn verify_chain(links: &[impl ChainLink]) -> Result<(), ChainError> {
        let mut previous: Option<[u8; 32]> = None;

        for (index, link) in links.iter().enumerate() {
            let expected_seq = index as u64 + 1;
            if link.seq() != expected_seq {
                return Err(ChainError::SequenceGap {
                    index,
                    expected: expected_seq,
                    found: link.seq(),
                });
            }

            match (previous, link.parent_id()) {
                (None, Some(_)) => return Err(ChainError::GenesisHasParent),
                (Some(prev), Some(parent)) if prev != parent => {
                    return Err(ChainError::BrokenLink { index })
                }
                (Some(_), None) => return Err(ChainError::MissingParent { index }),
                _ => {}
            }

            if Self::compute_id(&link.payload_bytes()) != link.link_id() {
                return Err(ChainError::IdMismatch { index });
            }

            previous = Some(link.link_id());
        }

        Ok(())
    }

    /// Check that `link` may be appended after `tip` (None = empty chain).
    pub fn verify_extends(tip: Option<&impl ChainLink>, link: &impl ChainLink) -> Result<(), ChainError> {
        let expected_seq = tip.map(|t| t.seq() + 1).unwrap_or(1);
        if link.seq() != expected_seq {
            return Err(ChainError::SequenceGap {
                index: expected_seq.saturating_sub(1) as usize,
                expected: expected_seq,
                found: link.seq(),
            });
        }
        let index = (expected_seq - 1) as usize;
        match (tip.map(|t| t.link_id()), link.parent_id()) {
            (None, Some(_)) => return Err(ChainError::GenesisHasParent),
            (Some(prev), Some(parent)) if prev != parent => {
                return Err(ChainError::BrokenLink { index })
            }
            (Some(_), None) => return Err(ChainError::MissingParent { index }),
            _ => {}
        }
        if Self::compute_id(&link.payload_bytes()) != link.link_id() {
            return Err(ChainError::IdMismatch { index });
        }
        Ok(())
    }

    /// Compute the expected id for a payload.
    pub fn compute_id(payload: &[u8]) -> [u8; 32] {
        ContentHasher::RECORD.hash(payload)
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("first record has a parent (should be None)")]
    GenesisHasParent,

    #[error("broken link at index {index}: parent does not match previous record")]
    BrokenLink { index: usize },

    #[error("missing parent at index {index} (should reference previous record)")]
    MissingParent { index: usize },

    #[error("id mismatch at index {index}: computed id differs from stored")]
    IdMismatch { index: usize },

    #[error("sequence gap at index {index}: expected seq {expected}, found {found}")]
    SequenceGap {
        index: usize,
        expected: u64,
        found: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestLink {
        id: [u8; 32],
        parent: Option<[u8; 32]>,
        seq: u64,
        payload: Vec<u8>,
    }

    impl ChainLink for TestLink {
        fn link_id(&self) -> [u8; 32] {
            self.id
        }
        fn parent_id(&self) -> Option<[u8; 32]> {
            self.parent
        }
        fn seq(&self) -> u64 {
            self.seq
        }
        fn payload_bytes(&self) -> Vec<u8> {
            self.payload.clone()
        }
    }

    fn build_chain(count: usize) -> Vec<TestLink> {
        let mut chain = Vec::new();
        let mut parent: Option<[u8; 32]> = None;

        for i in 0..count {
            let payload = format!("record-{i}-{parent:?}").into_bytes();
            let id = HashChainVerifier::compute_id(&payload);
            chain.push(TestLink {
                id,
                parent,
                seq: i as u64 + 1,
                payload,
            });
            parent = Some(id);
        }

        chain
    }

    #[test]
    fn empty_chain_is_valid() {
        let chain: Vec<TestLink> = vec![];
        assert!(HashChainVerifier::verify_chain(&chain).is_ok());
    }

    #[test]
    fn multi_record_chain() {
        assert!(HashChainVerifier::verify_chain(&build_chain(10)).is_ok());
    }

    #[test]
    fn genesis_with_parent_fails() {
        let mut chain = build_chain(1);
        chain[0].parent = Some([1; 32]);
        let err = HashChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::GenesisHasParent);
    }

    #[test]
    fn broken_link_detected() {
        let mut chain = build_chain(3);
        chain[2].parent = Some([99; 32]);
        let err = HashChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::BrokenLink { index: 2 });
    }

    #[test]
    fn missing_parent_detected() {
        let mut chain = build_chain(3);
        chain[1].parent = None;
        let err = HashChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::MissingParent { index: 1 });
    }

    #[test]
    fn tampered_payload_detected() {
        let mut chain = build_chain(3);
        chain[1].payload = b"tampered".to_vec();
        let err = HashChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(err, ChainError::IdMismatch { index: 1 });
    }

    #[test]
    fn sequence_gap_detected() {
        let mut chain = build_chain(3);
        chain[2].seq = 4;
        let err = HashChainVerifier::verify_chain(&chain).unwrap_err();
        assert_eq!(
            err,
            ChainError::SequenceGap { index: 2, expected: 3, found: 4 }
        );
    }

    #[test]
    fn extends_accepts_next_link() {
        let chain = build_chain(2);
        assert!(HashChainVerifier::verify_extends(None::<&TestLink>, &chain[0]).is_ok());
        assert!(HashChainVerifier::verify_extends(Some(&chain[0]), &chain[1]).is_ok());
    }

    #[test]
    fn extends_rejects_skipped_link() {
        let chain = build_chain(3);
        let err = HashChainVerifier::verify_extends(Some(&chain[0]), &chain[2]).unwrap_err();
        assert!(matches!(err, ChainError::SequenceGap { expected: 2, found: 3, .. }));
    }
}
