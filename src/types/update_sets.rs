/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The set of writes that a store transaction has accumulated but not yet committed.

use std::collections::{btree_map, btree_set, BTreeMap, BTreeSet};

use borsh::{BorshDeserialize, BorshSerialize};

/// Key-value updates and key deletions that are written into a store when the transaction holding
/// them gets committed.
///
/// `PendingWrites` is also the plain snapshot object of a single store transaction: it is what
/// [`to_object`](crate::store::transaction::StoreTransaction::to_object) returns and what
/// [`populate_from_object`](crate::store::transaction::StoreTransaction::populate_from_object)
/// consumes. Both collections are ordered, so the Borsh encoding of a `PendingWrites` is canonical.
///
/// # Uniqueness of keys between `updates` and `deletes`
///
/// A key is never in both `updates` and `deletes`. [`insert`](Self::insert) and
/// [`delete`](Self::delete) maintain this by cancelling the opposite operation on the same key.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PendingWrites {
    updates: BTreeMap<Vec<u8>, Vec<u8>>,
    deletes: BTreeSet<Vec<u8>>,
}

impl PendingWrites {
    /// Create a new `PendingWrites` with empty `updates` and `deletes`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule writing `value` at `key`. Cancels a scheduled deletion of `key`.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.deletes.remove(&key);
        self.updates.insert(key, value);
    }

    /// Schedule the deletion of `key`. Cancels a scheduled update of `key`.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.updates.remove(&key);
        self.deletes.insert(key);
    }

    /// Get the value scheduled to be written at `key`, if any.
    pub fn get_insert(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.updates.get(key)
    }

    /// Check whether `key` is scheduled to be deleted.
    pub fn contains_delete(&self, key: &[u8]) -> bool {
        self.deletes.contains(key)
    }

    /// Merge `other` into `self`. Writes in `other` take precedence.
    pub fn merge(&mut self, other: PendingWrites) {
        for (key, value) in other.updates {
            self.insert(key, value);
        }
        for key in other.deletes {
            self.delete(key);
        }
    }

    /// Iterate over the scheduled updates in ascending key order.
    pub fn inserts(&self) -> btree_map::Iter<Vec<u8>, Vec<u8>> {
        self.updates.iter()
    }

    /// Iterate over the scheduled deletions in ascending key order.
    pub fn deletes(&self) -> btree_set::Iter<Vec<u8>> {
        self.deletes.iter()
    }

    /// Check whether nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.deletes.is_empty()
    }

    /// Number of keys touched (updated or deleted).
    pub fn len(&self) -> usize {
        self.updates.len() + self.deletes.len()
    }
}
