/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Durable persistence of the shadow generation.
//!
//! The shadow generation is the last fully committed block's [`StoreTransactionGroup`], kept open over
//! the shadow backends so that queries can read it. Its pending writes only live in memory, so after
//! every commit the coordinator stores a snapshot of it in a single record of the metadata store. On
//! restart, [`ShadowStateRepository::fetch`] rebuilds the generation from that record.
//!
//! ## Record format
//!
//! The record is stored at [`SHADOW_STATE`](crate::store::variables::SHADOW_STATE) and holds the
//! Borsh serialization of a [`GroupSnapshot`]: for each of the five member names, the member's
//! `{updates, deletes}`. Both maps are ordered, so encoding and decoding round-trip exactly.
//!
//! ## Interrupted blocks
//!
//! Before a block's commit touches any backend, the coordinator also records the block's writes as an
//! [`InterruptedBlock`] at [`INTERRUPTED_BLOCK`]. Storing the next shadow generation erases that record
//! in the same write batch, so the record exists exactly when a commit started but did not finish.

use std::{collections::BTreeSet, fmt, io};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    store::{
        backends::StoreBackends,
        group::{GroupError, GroupSnapshot, StoreTransactionGroup},
        pluggables::{DocumentCollections, KVGet, KVStore, WriteBatch},
        variables::{INTERRUPTED_BLOCK, SHADOW_STATE},
    },
    types::data_types::{BlockHeight, Identifier},
};

/// The writes of a block whose commit has started.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct InterruptedBlock {
    pub height: BlockHeight,
    pub writes: GroupSnapshot,
    /// Data contracts created in the block, whose document collections the commit creates.
    pub data_contracts: BTreeSet<Identifier>,
}

pub struct ShadowStateRepository<K: KVStore, D: DocumentCollections> {
    // Store holding the durable record.
    metadata: K,

    // Backends that restored shadow generations are opened over.
    backends: StoreBackends<K, D>,
}

impl<K: KVStore, D: DocumentCollections> ShadowStateRepository<K, D> {
    pub fn new(metadata: K, backends: StoreBackends<K, D>) -> Self {
        Self { metadata, backends }
    }

    /// The backends that shadow generations live on.
    pub fn backends(&self) -> &StoreBackends<K, D> {
        &self.backends
    }

    /// Persist a snapshot of `group`, replacing any previous record and erasing the interrupted block
    /// record.
    pub fn store(&mut self, group: &StoreTransactionGroup) -> Result<(), ShadowStateError> {
        if !group.is_started() {
            return Err(ShadowStateError::GroupNotStarted);
        }

        let bytes = group
            .to_object()
            .try_to_vec()
            .map_err(|source| ShadowStateError::SerializeError { source })?;

        let mut wb = K::WriteBatch::new();
        wb.set(&SHADOW_STATE, &bytes);
        wb.delete(&INTERRUPTED_BLOCK);
        self.metadata
            .write(wb)
            .map_err(|source| ShadowStateError::WriteError { source })
    }

    /// Rebuild the shadow generation from the durable record, or return `None` if nothing was ever
    /// stored.
    pub fn fetch(&self) -> Result<Option<StoreTransactionGroup>, ShadowStateError> {
        let bytes = match self.metadata.get(&SHADOW_STATE) {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        let snapshot = GroupSnapshot::try_from_slice(&bytes)
            .map_err(|source| ShadowStateError::DeserializeError { source })?;

        let mut group = self.backends.new_group();
        group.start()?;
        group.populate_from_object(snapshot)?;
        Ok(Some(group))
    }

    /// Erase the durable record.
    pub fn clear(&mut self) -> Result<(), ShadowStateError> {
        let mut wb = K::WriteBatch::new();
        wb.delete(&SHADOW_STATE);
        self.metadata
            .write(wb)
            .map_err(|source| ShadowStateError::WriteError { source })
    }

    pub fn store_interrupted_block(&mut self, block: &InterruptedBlock) -> Result<(), ShadowStateError> {
        let bytes = block
            .try_to_vec()
            .map_err(|source| ShadowStateError::SerializeError { source })?;

        let mut wb = K::WriteBatch::new();
        wb.set(&INTERRUPTED_BLOCK, &bytes);
        self.metadata
            .write(wb)
            .map_err(|source| ShadowStateError::WriteError { source })
    }

    /// The block whose commit started but never stored its shadow generation, if any.
    pub fn fetch_interrupted_block(&self) -> Result<Option<InterruptedBlock>, ShadowStateError> {
        match self.metadata.get(&INTERRUPTED_BLOCK) {
            Some(bytes) => InterruptedBlock::try_from_slice(&bytes)
                .map(Some)
                .map_err(|source| ShadowStateError::DeserializeError { source }),
            None => Ok(None),
        }
    }

    pub fn clear_interrupted_block(&mut self) -> Result<(), ShadowStateError> {
        let mut wb = K::WriteBatch::new();
        wb.delete(&INTERRUPTED_BLOCK);
        self.metadata
            .write(wb)
            .map_err(|source| ShadowStateError::WriteError { source })
    }
}

/// Error when storing or fetching the shadow state record.
#[derive(Debug)]
pub enum ShadowStateError {
    /// Only started groups hold a meaningful snapshot.
    GroupNotStarted,
    SerializeError { source: io::Error },
    DeserializeError { source: io::Error },
    WriteError { source: io::Error },
    GroupError(GroupError),
}

impl fmt::Display for ShadowStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShadowStateError::GroupNotStarted => write!(f, "transaction group is not started"),
            ShadowStateError::SerializeError { source } => {
                write!(f, "cannot serialize shadow state: {}", source)
            }
            ShadowStateError::DeserializeError { source } => {
                write!(f, "cannot deserialize shadow state: {}", source)
            }
            ShadowStateError::WriteError { source } => {
                write!(f, "cannot write shadow state: {}", source)
            }
            ShadowStateError::GroupError(err) => write!(f, "cannot restore shadow state: {}", err),
        }
    }
}

impl std::error::Error for ShadowStateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShadowStateError::GroupNotStarted => None,
            ShadowStateError::SerializeError { source }
            | ShadowStateError::DeserializeError { source }
            | ShadowStateError::WriteError { source } => Some(source),
            ShadowStateError::GroupError(err) => Some(err),
        }
    }
}

impl From<GroupError> for ShadowStateError {
    fn from(value: GroupError) -> Self {
        ShadowStateError::GroupError(value)
    }
}
