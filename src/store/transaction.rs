/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`StoreTransaction`] capability and its implementation over a [`KVStore`].
//!
//! A store transaction is an atomic unit of work over one storage backend. Writes made through a
//! started transaction are buffered as [`PendingWrites`] and only reach the backend on
//! [`commit`](StoreTransaction::commit). Reads through a started transaction see its own pending writes
//! overlaid on the backend.
//!
//! ## Lifecycle
//!
//! ```text
//! NotStarted --start--> Started --commit--> Committed
//!                          |
//!                          +----abort-----> Aborted
//! ```
//!
//! A committed or aborted transaction can be started again, beginning with no pending writes.

use std::{collections::BTreeMap, fmt, io};

use crate::types::{data_types::Identifier, update_sets::PendingWrites};

use super::pluggables::{KVGet, KVStore, WriteBatch};

/// State of a single store transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    NotStarted,
    Started,
    Committed,
    Aborted,
}

/// Methods every storage backend's transaction exposes to a
/// [`StoreTransactionGroup`](super::group::StoreTransactionGroup).
///
/// The group holds its members as `Box<dyn StoreTransaction>` and drives them from several threads at
/// once, hence the `Send + Sync` bound.
pub trait StoreTransaction: Send + Sync {
    fn state(&self) -> TransactionState;

    fn is_started(&self) -> bool {
        self.state() == TransactionState::Started
    }

    fn start(&mut self) -> Result<(), StoreError>;

    /// Check that [`commit`](Self::commit) can succeed, without writing anything.
    fn prepare_commit(&self) -> Result<(), StoreError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(StoreError::NotStarted)
        }
    }

    fn commit(&mut self) -> Result<(), StoreError>;

    fn abort(&mut self) -> Result<(), StoreError>;

    /// Read `key`, seeing this transaction's pending writes if it is started.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError>;

    /// Every key-value pair visible through this transaction, in ascending key order.
    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Plain snapshot of this transaction's pending writes.
    fn to_object(&self) -> PendingWrites;

    /// Merge `snapshot` into this transaction's pending writes, starting the transaction first if it is
    /// not started.
    fn populate_from_object(&mut self, snapshot: PendingWrites) -> Result<(), StoreError>;

    /// Create a new, not-started transaction over the same backend.
    fn fresh(&self) -> Box<dyn StoreTransaction>;
}

/// Error when operating on a single store transaction.
#[derive(Debug)]
pub enum StoreError {
    AlreadyStarted,
    NotStarted,
    WriteFailed { source: io::Error },
    CollectionNotFound { contract: Identifier },
    MalformedDocumentKey { key: Vec<u8> },
    /// The thread running this transaction's part of a group operation panicked.
    WorkerPanicked,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyStarted => write!(f, "transaction is already started"),
            StoreError::NotStarted => write!(f, "transaction is not started"),
            StoreError::WriteFailed { source } => write!(f, "write to store failed: {}", source),
            StoreError::CollectionNotFound { contract } => {
                write!(f, "document collection for contract {} does not exist", contract)
            }
            StoreError::MalformedDocumentKey { key } => {
                write!(f, "documents index key of length {} is malformed", key.len())
            }
            StoreError::WorkerPanicked => write!(f, "transaction worker thread panicked"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::WriteFailed { source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(source: io::Error) -> Self {
        StoreError::WriteFailed { source }
    }
}

/// A [`StoreTransaction`] that buffers writes to a [`KVStore`] and applies them in one
/// [`WriteBatch`](super::pluggables::WriteBatch).
pub struct KVStoreTransaction<K: KVStore> {
    store: K,
    state: TransactionState,
    pending: PendingWrites,
}

impl<K: KVStore> KVStoreTransaction<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            state: TransactionState::NotStarted,
            pending: PendingWrites::new(),
        }
    }

    pub(crate) fn store(&self) -> &K {
        &self.store
    }

    pub(crate) fn pending(&self) -> &PendingWrites {
        &self.pending
    }

    fn ensure_started(&self) -> Result<(), StoreError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(StoreError::NotStarted)
        }
    }
}

impl<K: KVStore> StoreTransaction for KVStoreTransaction<K> {
    fn state(&self) -> TransactionState {
        self.state
    }

    fn start(&mut self) -> Result<(), StoreError> {
        if self.is_started() {
            return Err(StoreError::AlreadyStarted);
        }
        self.pending = PendingWrites::new();
        self.state = TransactionState::Started;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_started()?;

        let mut wb = K::WriteBatch::new();
        for (key, value) in self.pending.inserts() {
            wb.set(key, value);
        }
        for key in self.pending.deletes() {
            wb.delete(key);
        }
        self.store.write(wb)?;

        self.pending = PendingWrites::new();
        self.state = TransactionState::Committed;
        Ok(())
    }

    fn abort(&mut self) -> Result<(), StoreError> {
        self.ensure_started()?;
        self.pending = PendingWrites::new();
        self.state = TransactionState::Aborted;
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if self.pending.contains_delete(key) {
            None
        } else if let Some(value) = self.pending.get_insert(key) {
            Some(value.clone())
        } else {
            self.store.get(key)
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.ensure_started()?;
        self.pending.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), StoreError> {
        self.ensure_started()?;
        self.pending.delete(key.to_vec());
        Ok(())
    }

    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self.store.entries().into_iter().collect();
        for (key, value) in self.pending.inserts() {
            merged.insert(key.clone(), value.clone());
        }
        for key in self.pending.deletes() {
            merged.remove(key);
        }
        merged.into_iter().collect()
    }

    fn to_object(&self) -> PendingWrites {
        self.pending.clone()
    }

    fn populate_from_object(&mut self, snapshot: PendingWrites) -> Result<(), StoreError> {
        if !self.is_started() {
            self.start()?;
        }
        self.pending.merge(snapshot);
        Ok(())
    }

    fn fresh(&self) -> Box<dyn StoreTransaction> {
        Box::new(KVStoreTransaction::new(self.store.clone()))
    }
}
