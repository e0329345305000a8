/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The transactions that `DeliverTx` applies to the current generation.
//!
//! Applying a [`StateTransition`] is split in two: [`validate`](StateTransition::validate) reads the
//! current generation and rejects invalid transitions without writing anything, then
//! [`apply`](StateTransition::apply) writes. A transition that fails validation leaves the block
//! untouched and is reported through its response code.
//!
//! ## Key layout
//!
//! | Member | Key | Value |
//! |---|---|---|
//! | `identities` | identity id | identity |
//! | `publicKeyToIdentityId` | 20-byte public key hash | identity id |
//! | `dataContracts` | contract id | contract |
//! | `documents` | contract id ++ document id | document |

use std::{collections::BTreeSet, fmt};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    block_execution::{BlockExecutionError, ExecutionScope},
    store::{group::MemberName, variables::document_key},
    types::data_types::Identifier,
};

pub type PublicKeyHash = [u8; 20];

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum StateTransition {
    IdentityCreate {
        identity_id: Identifier,
        public_key_hashes: Vec<PublicKeyHash>,
        identity: Vec<u8>,
    },
    DataContractCreate {
        contract_id: Identifier,
        contract: Vec<u8>,
    },
    DocumentsBatch {
        contract_id: Identifier,
        puts: Vec<(Identifier, Vec<u8>)>,
        deletes: Vec<Identifier>,
    },
}

impl StateTransition {
    /// Check this transition against the state visible through `scope`.
    pub fn validate(&self, scope: &ExecutionScope<'_>) -> Result<(), ValidationError> {
        match self {
            StateTransition::IdentityCreate {
                identity_id,
                public_key_hashes,
                ..
            } => {
                if scope.get(MemberName::Identities, &identity_id.bytes()).is_some() {
                    return Err(ValidationError::IdentityAlreadyExists(*identity_id));
                }
                let mut seen = BTreeSet::new();
                for public_key_hash in public_key_hashes {
                    if !seen.insert(public_key_hash)
                        || scope
                            .get(MemberName::PublicKeyToIdentityId, public_key_hash)
                            .is_some()
                    {
                        return Err(ValidationError::PublicKeyAlreadyRegistered(*public_key_hash));
                    }
                }
                Ok(())
            }

            StateTransition::DataContractCreate { contract_id, .. } => {
                if scope.get(MemberName::DataContracts, &contract_id.bytes()).is_some() {
                    Err(ValidationError::DataContractAlreadyExists(*contract_id))
                } else {
                    Ok(())
                }
            }

            StateTransition::DocumentsBatch {
                contract_id,
                deletes,
                ..
            } => {
                if scope.get(MemberName::DataContracts, &contract_id.bytes()).is_none() {
                    return Err(ValidationError::DataContractNotFound(*contract_id));
                }
                for document_id in deletes {
                    if scope
                        .get(MemberName::Documents, &document_key(contract_id, document_id))
                        .is_none()
                    {
                        return Err(ValidationError::DocumentNotFound(*document_id));
                    }
                }
                Ok(())
            }
        }
    }

    /// Write this transition into the current generation. Assumes [`validate`](Self::validate)
    /// succeeded.
    pub fn apply(&self, scope: &mut ExecutionScope<'_>) -> Result<(), BlockExecutionError> {
        match self {
            StateTransition::IdentityCreate {
                identity_id,
                public_key_hashes,
                identity,
            } => {
                scope.set(MemberName::Identities, &identity_id.bytes(), identity)?;
                for public_key_hash in public_key_hashes {
                    scope.set(
                        MemberName::PublicKeyToIdentityId,
                        public_key_hash,
                        &identity_id.bytes(),
                    )?;
                }
            }

            StateTransition::DataContractCreate {
                contract_id,
                contract,
            } => {
                scope.set(MemberName::DataContracts, &contract_id.bytes(), contract)?;
                scope.add_data_contract(*contract_id);
            }

            StateTransition::DocumentsBatch {
                contract_id,
                puts,
                deletes,
            } => {
                for (document_id, document) in puts {
                    scope.set(
                        MemberName::Documents,
                        &document_key(contract_id, document_id),
                        document,
                    )?;
                }
                for document_id in deletes {
                    scope.delete(MemberName::Documents, &document_key(contract_id, document_id))?;
                }
            }
        }
        Ok(())
    }
}

/// Reason a [`StateTransition`] is rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    IdentityAlreadyExists(Identifier),
    PublicKeyAlreadyRegistered(PublicKeyHash),
    DataContractAlreadyExists(Identifier),
    DataContractNotFound(Identifier),
    DocumentNotFound(Identifier),
}

impl ValidationError {
    /// Response code reported for a transaction rejected this way.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IdentityAlreadyExists(_) => 10,
            ValidationError::PublicKeyAlreadyRegistered(_) => 11,
            ValidationError::DataContractAlreadyExists(_) => 12,
            ValidationError::DataContractNotFound(_) => 13,
            ValidationError::DocumentNotFound(_) => 14,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::IdentityAlreadyExists(id) => write!(f, "identity {} already exists", id),
            ValidationError::PublicKeyAlreadyRegistered(_) => {
                write!(f, "public key is already registered to an identity")
            }
            ValidationError::DataContractAlreadyExists(id) => {
                write!(f, "data contract {} already exists", id)
            }
            ValidationError::DataContractNotFound(id) => write!(f, "data contract {} is not found", id),
            ValidationError::DocumentNotFound(id) => write!(f, "document {} is not found", id),
        }
    }
}

impl std::error::Error for ValidationError {}
