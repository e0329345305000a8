/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-block accounting, and the scope through which transactions mutate the current generation.

use std::collections::BTreeSet;

use crate::{
    store::{
        group::{MemberName, StoreTransactionGroup},
        transaction::StoreTransaction,
    },
    types::{
        block::BlockHeader,
        data_types::{Credits, Identifier},
    },
};

use super::BlockExecutionError;

/// What the block being executed has accumulated so far, other than store writes.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockExecutionContext {
    pub header: BlockHeader,
    pub accumulated_fees: Credits,
    /// Data contracts created in this block. Their document collections are created at commit.
    pub data_contracts: BTreeSet<Identifier>,
}

impl BlockExecutionContext {
    pub fn new(header: BlockHeader) -> Self {
        Self {
            header,
            accumulated_fees: Credits::new(0),
            data_contracts: BTreeSet::new(),
        }
    }
}

/// Mutable access to the current generation while a block is executing.
///
/// Obtained from [`BlockExecutionCoordinator::execution`](super::BlockExecutionCoordinator::execution).
/// Nothing written through a scope is visible to queries until the block commits.
pub struct ExecutionScope<'a> {
    pub(super) group: &'a mut StoreTransactionGroup,
    pub(super) context: &'a mut BlockExecutionContext,
}

impl<'a> ExecutionScope<'a> {
    pub fn header(&self) -> &BlockHeader {
        &self.context.header
    }

    pub fn transaction(&self, member: MemberName) -> &dyn StoreTransaction {
        self.group.transaction(member)
    }

    pub fn transaction_mut(&mut self, member: MemberName) -> &mut dyn StoreTransaction {
        self.group.transaction_mut(member)
    }

    /// Read `key` from `member`, seeing the writes of this block.
    pub fn get(&self, member: MemberName, key: &[u8]) -> Option<Vec<u8>> {
        self.group.transaction(member).get(key)
    }

    pub fn set(&mut self, member: MemberName, key: &[u8], value: &[u8]) -> Result<(), BlockExecutionError> {
        self.group
            .transaction_mut(member)
            .set(key, value)
            .map_err(|source| BlockExecutionError::member(member, source))
    }

    pub fn delete(&mut self, member: MemberName, key: &[u8]) -> Result<(), BlockExecutionError> {
        self.group
            .transaction_mut(member)
            .delete(key)
            .map_err(|source| BlockExecutionError::member(member, source))
    }

    pub fn add_fees(&mut self, fees: Credits) {
        self.context.accumulated_fees += fees;
    }

    /// Record that `contract` was created in this block, so that its document collection gets created
    /// when the block commits.
    pub fn add_data_contract(&mut self, contract: Identifier) {
        self.context.data_contracts.insert(contract);
    }

    pub fn accumulated_fees(&self) -> Credits {
        self.context.accumulated_fees
    }
}
