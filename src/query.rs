/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Point-in-time queries against the shadow generation.
//!
//! Queries never read the current generation: while block N executes, every query answers with the
//! state as of block N-1, and proofs are computed against that state's commitment. That commitment
//! hash is kept with the shadow generation when it is installed; the full commitment tree is only
//! rebuilt for queries that ask for a proof.
//!
//! ## Paths
//!
//! | Path | Data | Value |
//! |---|---|---|
//! | `/identities` | 32-byte identity id | identity |
//! | `/identities/by-public-key-hash` | 20-byte public key hash | identity registered to the key |
//! | `/dataContracts` | 32-byte contract id | data contract |
//! | `/documents` | 32-byte contract id ++ 32-byte document id | document |

use std::fmt;

use crate::{
    block_execution::ShadowGeneration,
    commitment::{FullProof, RootCommitmentTree},
    store::{
        group::MemberName,
        variables::{DOCUMENT_KEY_LEN, PUBLIC_KEY_HASH_LEN},
    },
    types::data_types::{CryptoHash, Identifier},
};

pub const IDENTITIES_PATH: &str = "/identities";
pub const IDENTITY_BY_PUBLIC_KEY_HASH_PATH: &str = "/identities/by-public-key-hash";
pub const DATA_CONTRACTS_PATH: &str = "/dataContracts";
pub const DOCUMENTS_PATH: &str = "/documents";

/// Answer to a query. `value` is `None` if nothing is stored under the requested key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryResponse {
    pub value: Option<Vec<u8>>,
    /// Proof of `value` against `commitment_hash`, if requested.
    pub proof: Option<FullProof>,
    pub commitment_hash: CryptoHash,
}

#[derive(Clone)]
pub struct QueryHandler {
    shadow: ShadowGeneration,
}

impl QueryHandler {
    pub fn new(shadow: ShadowGeneration) -> Self {
        Self { shadow }
    }

    pub fn query(&self, path: &str, data: &[u8], prove: bool) -> Result<QueryResponse, QueryError> {
        let guard = self.shadow.read();
        let generation = guard.as_ref().ok_or(QueryError::ShadowStateUnavailable)?;
        let group = generation.group();

        let (member, key) = match path {
            IDENTITIES_PATH => (MemberName::Identities, expect_len(path, data, Identifier::LEN)?),
            IDENTITY_BY_PUBLIC_KEY_HASH_PATH => {
                let public_key_hash = expect_len(path, data, PUBLIC_KEY_HASH_LEN)?;
                match group
                    .transaction(MemberName::PublicKeyToIdentityId)
                    .get(&public_key_hash)
                {
                    Some(identity_id) => (MemberName::Identities, identity_id),
                    // Unregistered: answer from the index itself.
                    None => (MemberName::PublicKeyToIdentityId, public_key_hash),
                }
            }
            DATA_CONTRACTS_PATH => (MemberName::DataContracts, expect_len(path, data, Identifier::LEN)?),
            DOCUMENTS_PATH => (MemberName::Documents, expect_len(path, data, DOCUMENT_KEY_LEN)?),
            _ => return Err(QueryError::UnknownPath(path.to_string())),
        };

        let value = group.transaction(member).get(&key);
        // Building the tree reads every entry of every store.
        let proof = if prove {
            Some(RootCommitmentTree::from_group(group).full_proof(member, &[key]))
        } else {
            None
        };
        Ok(QueryResponse {
            value,
            proof,
            commitment_hash: generation.commitment_hash(),
        })
    }
}

fn expect_len(path: &str, data: &[u8], expected: usize) -> Result<Vec<u8>, QueryError> {
    if data.len() == expected {
        Ok(data.to_vec())
    } else {
        Err(QueryError::InvalidData {
            path: path.to_string(),
            expected,
            actual: data.len(),
        })
    }
}

/// Error when serving a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryError {
    /// No block has been committed or recovered yet.
    ShadowStateUnavailable,
    UnknownPath(String),
    InvalidData {
        path: String,
        expected: usize,
        actual: usize,
    },
}

impl QueryError {
    pub fn code(&self) -> u32 {
        match self {
            QueryError::ShadowStateUnavailable => 1,
            QueryError::UnknownPath(_) => 2,
            QueryError::InvalidData { .. } => 3,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::ShadowStateUnavailable => write!(f, "shadow state is not available yet"),
            QueryError::UnknownPath(path) => write!(f, "unknown query path {}", path),
            QueryError::InvalidData {
                path,
                expected,
                actual,
            } => write!(
                f,
                "{} expects {} bytes of data, got {}",
                path, expected, actual
            ),
        }
    }
}

impl std::error::Error for QueryError {}
