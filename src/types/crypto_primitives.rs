/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! Every hash this crate computes (commitment roots, Merkle nodes, quorum scores) is a single round
//! of SHA-256, provided by the [`sha2`] crate.

use super::data_types::CryptoHash;

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

/// Hash the concatenation of `parts` with a single round of SHA-256.
pub fn sha256(parts: &[&[u8]]) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    for part in parts {
        hasher.update(part);
    }
    CryptoHash::new(hasher.finalize().into())
}
