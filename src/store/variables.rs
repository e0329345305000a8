/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Keys that specify where each state variable is stored in the user-provided key-value stores.
//!
//! # List of State Variables
//!
//! |Variable|Store|Key|Value|
//! |---|---|---|---|
//! |Chain Info|`common` member|[`CHAIN_INFO`]|Borsh-serialized [`ChainInfo`](crate::block_execution::ChainInfo)|
//! |Identity|`identities` member|identity id|opaque identity bytes|
//! |Data Contract|`dataContracts` member|contract id|opaque contract bytes|
//! |Document|`documents` member|[`document_key`]|opaque document bytes|
//! |Public Key to Identity|`publicKeyToIdentityId` member|20-byte public key hash|identity id|
//! |Validator Set Selection|`common` member|[`VALIDATOR_SET_SELECTION`]|Borsh-serialized [`ValidatorSetSelection`](crate::quorum::types::ValidatorSetSelection)|
//! |Shadow State|metadata store|[`SHADOW_STATE`]|Borsh-serialized [`GroupSnapshot`](super::group::GroupSnapshot)|
//! |Interrupted Block|metadata store|[`INTERRUPTED_BLOCK`]|Borsh-serialized [`InterruptedBlock`](crate::shadow_state::InterruptedBlock)|
//!
//! Single values are stored at one-byte constant keys. The documents index is a mapping from
//! `(contract id, document id)` to document, stored at the concatenation of both identifiers so
//! that all documents of one contract are adjacent in key order.

use crate::types::data_types::Identifier;

pub const CHAIN_INFO: [u8; 1] = [0];

pub const SHADOW_STATE: [u8; 1] = [1];

pub const INTERRUPTED_BLOCK: [u8; 1] = [2];

pub const VALIDATOR_SET_SELECTION: [u8; 1] = [3];

/// Length of a key in the documents index.
pub const DOCUMENT_KEY_LEN: usize = 2 * Identifier::LEN;

/// Length of a public key hash in the public-key-to-identity index.
pub const PUBLIC_KEY_HASH_LEN: usize = 20;

/// Key of `document` of `contract` in the documents index.
pub fn document_key(contract: &Identifier, document: &Identifier) -> Vec<u8> {
    concat(&contract.bytes(), &document.bytes())
}

/// Split a documents index key into its contract and document identifiers.
pub fn split_document_key(key: &[u8]) -> Option<(Identifier, Identifier)> {
    if key.len() != DOCUMENT_KEY_LEN {
        return None;
    }
    let (contract, document) = key.split_at(Identifier::LEN);
    Some((Identifier::from_slice(contract)?, Identifier::from_slice(document)?))
}

/// Takes references to two byteslices and returns a vector containing the bytes of the first one, and then the bytes of the
/// second one.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
