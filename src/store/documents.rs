/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The composite transaction of the `documents` member.
//!
//! Documents live in two places: a key-value index (the authenticated store that contributes to the
//! ledger commitment) and the companion document collection of their data contract. A
//! [`DocumentsTransaction`] buffers writes in the index only; committing it first materializes those
//! writes into the collections and then writes the index batch. To the group it is a single opaque
//! [`StoreTransaction`].

use std::collections::BTreeSet;

use crate::types::{data_types::Identifier, update_sets::PendingWrites};

use super::{
    pluggables::{DocumentCollections, KVStore},
    transaction::{KVStoreTransaction, StoreError, StoreTransaction, TransactionState},
    variables::split_document_key,
};

pub struct DocumentsTransaction<K: KVStore, D: DocumentCollections> {
    index: KVStoreTransaction<K>,
    collections: D,
}

impl<K: KVStore, D: DocumentCollections> DocumentsTransaction<K, D> {
    pub fn new(index: K, collections: D) -> Self {
        Self {
            index: KVStoreTransaction::new(index),
            collections,
        }
    }

    /// Contracts that the pending writes of this transaction touch.
    fn pending_contracts(&self) -> Result<BTreeSet<Identifier>, StoreError> {
        pending_document_contracts(self.index.pending())
    }
}

/// Contracts referenced by the keys of a documents member's `pending` writes.
pub fn pending_document_contracts(pending: &PendingWrites) -> Result<BTreeSet<Identifier>, StoreError> {
    pending
        .inserts()
        .map(|(key, _)| key)
        .chain(pending.deletes())
        .map(|key| {
            split_document_key(key)
                .map(|(contract, _)| contract)
                .ok_or_else(|| StoreError::MalformedDocumentKey { key: key.clone() })
        })
        .collect()
}

impl<K: KVStore, D: DocumentCollections> StoreTransaction for DocumentsTransaction<K, D> {
    fn state(&self) -> TransactionState {
        self.index.state()
    }

    fn start(&mut self) -> Result<(), StoreError> {
        self.index.start()
    }

    fn prepare_commit(&self) -> Result<(), StoreError> {
        self.index.prepare_commit()?;
        for contract in self.pending_contracts()? {
            if !self.collections.exists(&contract) {
                return Err(StoreError::CollectionNotFound { contract });
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.prepare_commit()?;

        let pending = self.index.pending();
        for (key, value) in pending.inserts() {
            let (contract, document) = split_document_key(key)
                .ok_or_else(|| StoreError::MalformedDocumentKey { key: key.clone() })?;
            self.collections.put(&contract, &document, value)?;
        }
        for key in pending.deletes() {
            let (contract, document) = split_document_key(key)
                .ok_or_else(|| StoreError::MalformedDocumentKey { key: key.clone() })?;
            self.collections.remove(&contract, &document)?;
        }

        self.index.commit()
    }

    fn abort(&mut self) -> Result<(), StoreError> {
        self.index.abort()
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.index.get(key)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        if split_document_key(key).is_none() {
            return Err(StoreError::MalformedDocumentKey { key: key.to_vec() });
        }
        self.index.set(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        if split_document_key(key).is_none() {
            return Err(StoreError::MalformedDocumentKey { key: key.to_vec() });
        }
        self.index.delete(key)
    }

    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.index.entries()
    }

    fn to_object(&self) -> PendingWrites {
        self.index.to_object()
    }

    fn populate_from_object(&mut self, snapshot: PendingWrites) -> Result<(), StoreError> {
        pending_document_contracts(&snapshot)?;
        self.index.populate_from_object(snapshot)
    }

    fn fresh(&self) -> Box<dyn StoreTransaction> {
        Box::new(Self::new(
            self.index.store().clone(),
            self.collections.clone(),
        ))
    }
}
