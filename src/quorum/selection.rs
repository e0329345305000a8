/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deterministic selection of the active quorum.
//!
//! Every node must select the same quorum from the same inputs. Each candidate is scored with a single
//! round of SHA-256 over its hash followed by the rotation entropy; scores are compared as big-endian
//! byte strings and the smallest wins. No floating point and no dependence on the order candidates are
//! given in.

use crate::types::{crypto_primitives::sha256, data_types::CryptoHash};

/// `SHA-256(quorum_hash || rotation_entropy)`.
pub fn quorum_score(quorum_hash: &CryptoHash, rotation_entropy: &[u8]) -> CryptoHash {
    sha256(&[&quorum_hash.bytes(), rotation_entropy])
}

/// Select the candidate with the smallest score, or `None` if there are no candidates.
///
/// Equal scores would require a SHA-256 collision. Should one happen anyway, the smaller quorum hash
/// wins, so the result still does not depend on candidate order.
pub fn select_validator_set_hash<'a, I>(candidates: I, rotation_entropy: &[u8]) -> Option<CryptoHash>
where
    I: IntoIterator<Item = &'a CryptoHash>,
{
    candidates
        .into_iter()
        .map(|quorum_hash| (quorum_score(quorum_hash, rotation_entropy), *quorum_hash))
        .min()
        .map(|(_, quorum_hash)| quorum_hash)
}
