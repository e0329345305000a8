//! Traits for pluggable persistence.
//!
//! The state machine does not implement a storage engine. It requires that whatever the user provides
//! as persistence implements the abstract functionality of:
//! 1. A key-value store with atomic, batched writes ([`KVStore`]), used for every member of a
//!    [store transaction group](super::group::StoreTransactionGroup) and for the durable shadow state
//!    record.
//! 2. A document collections store ([`DocumentCollections`]), holding one companion collection per
//!    data contract.

use std::io;

use crate::types::data_types::Identifier;

pub trait KVStore: KVGet + Clone + Send + Sync + 'static {
    type WriteBatch: WriteBatch;

    /// Atomically apply every write in `wb`.
    fn write(&mut self, wb: Self::WriteBatch) -> io::Result<()>;
    fn clear(&mut self);
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Every key-value pair in the store, in ascending key order.
    fn entries(&self) -> Vec<(Vec<u8>, Vec<u8>)>;
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// Store of companion document collections, one per data contract.
///
/// Clones must share the same underlying collections.
pub trait DocumentCollections: Clone + Send + Sync + 'static {
    /// Create the collection of `contract`. Creating an existing collection is a no-op.
    fn create(&mut self, contract: &Identifier) -> io::Result<()>;

    /// Drop the collection of `contract` and every document in it.
    fn drop_collection(&mut self, contract: &Identifier) -> io::Result<()>;

    fn exists(&self, contract: &Identifier) -> bool;

    /// Write `document` into the collection of `contract`. Fails if the collection does not exist.
    fn put(&mut self, contract: &Identifier, document: &Identifier, bytes: &[u8]) -> io::Result<()>;

    /// Remove `document` from the collection of `contract`. Fails if the collection does not exist.
    fn remove(&mut self, contract: &Identifier, document: &Identifier) -> io::Result<()>;

    fn get(&self, contract: &Identifier, document: &Identifier) -> Option<Vec<u8>>;
}
