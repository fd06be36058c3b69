//! Hashing primitives for Ichnaea.
//!
//! Provides the incremental SHA-256 accumulator used while streaming blobs,
//! domain-separated BLAKE3 hashing for version records, and verification of
//! parent-linked record chains.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod chain;
pub mod digest;
pub mod hasher;

pub use chain::{ChainError, ChainLink, HashChainVerifier};
pub use digest::ContentDigest;
pub use hasher::ContentHasher;
