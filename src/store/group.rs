/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [`StoreTransactionGroup`]: five named store transactions driven as one logical unit per block.
//!
//! # Fan-out
//!
//! `start`, `commit`, and `abort` invoke every member concurrently, one scoped thread per member, and
//! join them all before returning. No order between members is guaranteed.
//!
//! # Consistency boundary
//!
//! `commit` first runs [`prepare_commit`](StoreTransaction::prepare_commit) on every member. If any
//! member fails that phase, nothing is written anywhere. Once the write phase begins, a failing member
//! does not undo the members that already wrote: the group is all-or-halt, not all-or-nothing, and
//! callers must treat a failed commit as fatal for the block.

use std::{collections::BTreeMap, collections::BTreeSet, fmt, str::FromStr, thread};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{data_types::Identifier, update_sets::PendingWrites};

use super::{
    documents::pending_document_contracts,
    transaction::{StoreError, StoreTransaction},
};

/// Names of the five fixed members of a [`StoreTransactionGroup`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberName {
    Common,
    Identities,
    Documents,
    DataContracts,
    PublicKeyToIdentityId,
}

impl MemberName {
    /// Every member, in the fixed member order.
    pub const ALL: [MemberName; 5] = [
        MemberName::Common,
        MemberName::Identities,
        MemberName::Documents,
        MemberName::DataContracts,
        MemberName::PublicKeyToIdentityId,
    ];

    /// The name that keys this member in a [`GroupSnapshot`].
    pub const fn as_str(&self) -> &'static str {
        match self {
            MemberName::Common => "common",
            MemberName::Identities => "identities",
            MemberName::Documents => "documents",
            MemberName::DataContracts => "dataContracts",
            MemberName::PublicKeyToIdentityId => "publicKeyToIdentityId",
        }
    }

    const fn index(&self) -> usize {
        match self {
            MemberName::Common => 0,
            MemberName::Identities => 1,
            MemberName::Documents => 2,
            MemberName::DataContracts => 3,
            MemberName::PublicKeyToIdentityId => 4,
        }
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberName {
    type Err = GroupError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        MemberName::ALL
            .into_iter()
            .find(|member| member.as_str() == name)
            .ok_or_else(|| GroupError::NotDefined(name.to_string()))
    }
}

/// Plain snapshot of a whole group: each member's [`PendingWrites`], keyed by member name.
///
/// This is the value persisted in the durable shadow state record.
#[derive(Clone, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct GroupSnapshot(BTreeMap<String, PendingWrites>);

impl GroupSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, member: &str, writes: PendingWrites) {
        self.0.insert(member.to_string(), writes);
    }

    pub fn get(&self, member: &str) -> Option<&PendingWrites> {
        self.0.get(member)
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, PendingWrites> {
        self.0.iter()
    }
}

impl IntoIterator for GroupSnapshot {
    type Item = (String, PendingWrites);
    type IntoIter = std::collections::btree_map::IntoIter<String, PendingWrites>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Error when operating on a [`StoreTransactionGroup`].
#[derive(Debug)]
pub enum GroupError {
    AlreadyStarted,
    NotStarted,
    /// The name is not one of the five fixed members.
    NotDefined(String),
    /// A member transaction failed. Other members may have already completed the same operation.
    Member { member: MemberName, source: StoreError },
}

impl fmt::Display for GroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupError::AlreadyStarted => write!(f, "transaction group is already started"),
            GroupError::NotStarted => write!(f, "transaction group is not started"),
            GroupError::NotDefined(name) => write!(f, "transaction {} is not defined", name),
            GroupError::Member { member, source } => {
                write!(f, "{} transaction failed: {}", member, source)
            }
        }
    }
}

impl std::error::Error for GroupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GroupError::Member { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Five named store transactions that form the atomic unit of work of one block.
///
/// ## Invariant
///
/// `is_started` reflects the group, not its members: it becomes true only when every member started
/// successfully, and false once the group has committed or aborted.
pub struct StoreTransactionGroup {
    // Indexed by `MemberName::index`.
    members: Vec<Box<dyn StoreTransaction>>,
    started: bool,
}

impl StoreTransactionGroup {
    /// Create a not-started group out of one transaction per member.
    pub fn new(members: [(MemberName, Box<dyn StoreTransaction>); 5]) -> Self {
        let mut members = members;
        members.sort_by_key(|(name, _)| name.index());
        Self {
            members: members.into_iter().map(|(_, transaction)| transaction).collect(),
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Start every member transaction.
    ///
    /// A member that started before another member failed stays started: partial starts are not rolled
    /// back here, the group simply stays not-started.
    pub fn start(&mut self) -> Result<(), GroupError> {
        if self.started {
            return Err(GroupError::AlreadyStarted);
        }
        self.fan_out(|transaction| transaction.start())?;
        self.started = true;
        Ok(())
    }

    /// Commit every member transaction. See the [consistency boundary](self#consistency-boundary).
    pub fn commit(&mut self) -> Result<(), GroupError> {
        if !self.started {
            return Err(GroupError::NotStarted);
        }
        self.fan_out(|transaction| transaction.prepare_commit())?;
        self.fan_out(|transaction| transaction.commit())?;
        self.started = false;
        Ok(())
    }

    /// Abort every member transaction.
    pub fn abort(&mut self) -> Result<(), GroupError> {
        if !self.started {
            return Err(GroupError::NotStarted);
        }
        self.started = false;
        self.fan_out(|transaction| {
            if transaction.is_started() {
                transaction.abort()
            } else {
                // Already committed during a failed group commit.
                Ok(())
            }
        })
    }

    /// Get the member transaction called `name`.
    pub fn get_transaction(&self, name: &str) -> Result<&dyn StoreTransaction, GroupError> {
        Ok(self.transaction(name.parse()?))
    }

    /// Get the member transaction called `name`, mutably.
    pub fn get_transaction_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut dyn StoreTransaction, GroupError> {
        Ok(self.transaction_mut(name.parse()?))
    }

    pub fn transaction(&self, member: MemberName) -> &dyn StoreTransaction {
        self.members[member.index()].as_ref()
    }

    pub fn transaction_mut(&mut self, member: MemberName) -> &mut dyn StoreTransaction {
        self.members[member.index()].as_mut()
    }

    /// Snapshot every member's pending writes.
    pub fn to_object(&self) -> GroupSnapshot {
        let mut snapshot = GroupSnapshot::new();
        for member in MemberName::ALL {
            snapshot.insert(member.as_str(), self.transaction(member).to_object());
        }
        snapshot
    }

    /// Restore pending writes from `snapshot`, starting the group first if it is not started.
    ///
    /// Every name in `snapshot` is checked before anything is restored.
    pub fn populate_from_object(&mut self, snapshot: GroupSnapshot) -> Result<(), GroupError> {
        let snapshot = snapshot
            .into_iter()
            .map(|(name, writes)| Ok((name.parse::<MemberName>()?, writes)))
            .collect::<Result<Vec<_>, GroupError>>()?;

        if !self.started {
            self.start()?;
        }

        for (member, writes) in snapshot {
            self.transaction_mut(member)
                .populate_from_object(writes)
                .map_err(|source| GroupError::Member { member, source })?;
        }
        Ok(())
    }

    /// Duplicate this group onto the same backends. The returned group is started and holds the same
    /// pending writes, but shares no mutable state with `self`.
    pub fn try_clone(&self) -> Result<StoreTransactionGroup, GroupError> {
        let members = MemberName::ALL.map(|member| (member, self.transaction(member).fresh()));
        let mut clone = StoreTransactionGroup::new(members);
        clone.start()?;
        clone.populate_from_object(self.to_object())?;
        Ok(clone)
    }

    /// Duplicate this group onto `target`, a group of not-started transactions over other backends.
    pub fn try_clone_into(
        &self,
        mut target: StoreTransactionGroup,
    ) -> Result<StoreTransactionGroup, GroupError> {
        target.start()?;
        target.populate_from_object(self.to_object())?;
        Ok(target)
    }

    /// Data contracts whose documents the `documents` member has pending writes for.
    pub fn pending_document_contracts(&self) -> Result<BTreeSet<Identifier>, GroupError> {
        pending_document_contracts(&self.transaction(MemberName::Documents).to_object()).map_err(
            |source| GroupError::Member {
                member: MemberName::Documents,
                source,
            },
        )
    }

    // Run `op` on every member concurrently and wait for all of them. Reports the first failure in
    // member order; every failure is logged.
    fn fan_out<F>(&mut self, op: F) -> Result<(), GroupError>
    where
        F: Fn(&mut dyn StoreTransaction) -> Result<(), StoreError> + Sync,
    {
        let op = &op;
        let results: Vec<Result<(), StoreError>> = thread::scope(|scope| {
            let handles: Vec<_> = self
                .members
                .iter_mut()
                .map(|transaction| scope.spawn(move || op(transaction.as_mut())))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or(Err(StoreError::WorkerPanicked)))
                .collect()
        });

        let mut first_error = None;
        for (member, result) in MemberName::ALL.into_iter().zip(results) {
            if let Err(source) = result {
                log::error!("{} transaction failed: {}", member, source);
                if first_error.is_none() {
                    first_error = Some(GroupError::Member { member, source });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
