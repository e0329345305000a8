/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The block execution coordinator: hands blocks off between the current and the shadow generation.
//!
//! # Generations
//!
//! At any moment there are two [`StoreTransactionGroup`]s:
//! - The **current** generation, over the current [`StoreBackends`], holds the writes of the block being
//!   executed. It is never visible to queries.
//! - The **shadow** generation, over the shadow backends, holds the writes of the last committed block.
//!   The shadow backends lag one block behind the current backends, so reads through the shadow
//!   generation's transactions see exactly the state as of the last committed block. This is the only
//!   generation queries read, through a [`ShadowGeneration`] handle.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --begin_block--> Executing --commit--> Committing --> Idle
//!                          |  ^
//!                          +--+ begin_block (aborts the stale block)
//! ```
//!
//! `commit` runs these steps for block N:
//! 1. Write the updated [`ChainInfo`] through the `common` member.
//! 2. Durably record the block's writes as an [`InterruptedBlock`].
//! 3. Create the document collection of every data contract created in the block.
//! 4. Duplicate the current generation onto the shadow backends, making the candidate shadow generation.
//! 5. Commit the current generation.
//! 6. Commit the previous shadow generation (block N-1) into the shadow backends, creating the shadow
//!    document collections it needs first.
//! 7. Durably store the candidate, erasing the interrupted block record, then make it the shadow
//!    generation.
//! 8. Return to `Idle`.
//!
//! # Failed commits
//!
//! A failure in steps 3 to 7 may leave some current backends with block N's writes and others without.
//! The group does not undo its members. Instead, the coordinator restores every key the interrupted block
//! touched to its value in the last durable shadow generation (block N-1), and drops the document
//! collections of contracts block N-1 does not have. It tries this right after the failure, and again
//! at every `begin_block` for as long as the interrupted block record exists. Once it succeeds, the
//! current backends hold block N-1 exactly and the block can be executed again from scratch.
//!
//! Either way, the error returned by `commit` must halt block processing.

pub mod chain_info;
pub mod context;

use std::{
    collections::BTreeSet,
    fmt, io,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::SystemTime,
};

use crate::{
    commitment::RootCommitmentTree,
    events::{
        AbortBlockEvent, BeginBlockEvent, CommitBlockEvent, Event, EventHandlers,
        RecoverShadowStateEvent,
    },
    shadow_state::{InterruptedBlock, ShadowStateError, ShadowStateRepository},
    store::{
        backends::StoreBackends,
        group::{GroupError, MemberName, StoreTransactionGroup},
        pluggables::{DocumentCollections, KVStore},
        transaction::{StoreError, StoreTransaction},
    },
    types::{
        block::BlockHeader,
        data_types::{BlockHeight, CryptoHash, Identifier},
    },
};

pub use chain_info::ChainInfo;
pub use context::{BlockExecutionContext, ExecutionScope};

/// Phase of the [`BlockExecutionCoordinator`] state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Executing,
    Committing,
}

/// The generation of a committed block, and the commitment hash of the ledger after that block.
pub struct CommittedGeneration {
    group: StoreTransactionGroup,
    commitment_hash: CryptoHash,
}

impl CommittedGeneration {
    pub fn group(&self) -> &StoreTransactionGroup {
        &self.group
    }

    pub fn transaction(&self, member: MemberName) -> &dyn StoreTransaction {
        self.group.transaction(member)
    }

    pub fn commitment_hash(&self) -> CryptoHash {
        self.commitment_hash
    }
}

/// Read handle to the shadow generation, shared between the coordinator and query handlers.
///
/// Only the coordinator replaces the generation. Readers hold the read lock for the duration of one
/// query, so they never observe a generation being replaced.
#[derive(Clone, Default)]
pub struct ShadowGeneration(Arc<RwLock<Option<CommittedGeneration>>>);

impl ShadowGeneration {
    /// Lock the shadow generation for reading. The guard holds `None` if no block has been committed
    /// (or recovered) yet.
    pub fn read(&self) -> RwLockReadGuard<'_, Option<CommittedGeneration>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_available(&self) -> bool {
        self.read().is_some()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<CommittedGeneration>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct BlockExecutionCoordinator<K: KVStore, D: DocumentCollections> {
    backends: StoreBackends<K, D>,
    shadow_repository: ShadowStateRepository<K, D>,
    current: Option<StoreTransactionGroup>,
    shadow: ShadowGeneration,
    context: Option<BlockExecutionContext>,
    phase: Phase,
    event_handlers: Arc<EventHandlers>,
}

impl<K: KVStore, D: DocumentCollections> BlockExecutionCoordinator<K, D> {
    /// Create a coordinator that commits blocks into `backends` and keeps the shadow generation over
    /// `shadow_repository`'s backends.
    pub fn new(
        backends: StoreBackends<K, D>,
        shadow_repository: ShadowStateRepository<K, D>,
        event_handlers: Arc<EventHandlers>,
    ) -> Self {
        Self {
            backends,
            shadow_repository,
            current: None,
            shadow: ShadowGeneration::default(),
            context: None,
            phase: Phase::Idle,
            event_handlers,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Get a read handle to the shadow generation.
    pub fn shadow_generation(&self) -> ShadowGeneration {
        self.shadow.clone()
    }

    /// Start executing the block described by `header`.
    ///
    /// If a previous block is still executing (its execution failed and the consensus engine is
    /// retrying), that block's current generation is aborted first. If a previous commit was
    /// interrupted, the stores it touched are restored before anything else.
    pub fn begin_block(&mut self, header: BlockHeader) -> Result<(), BlockExecutionError> {
        if self.phase == Phase::Executing {
            log::warn!(
                "Beginning block {} while another block is executing; aborting it.",
                header.height
            );
            self.abort_block("superseded by a new BeginBlock")?;
        }

        if header.height.int() > 1 && !self.shadow.is_available() {
            self.recover()?;
            if !self.shadow.is_available() {
                log::warn!(
                    "Beginning block {} but no shadow state was stored; queries are unavailable until it commits.",
                    header.height
                );
            }
        }
        self.restore_interrupted_block()?;

        let mut current = self.backends.new_group();
        current.start()?;

        self.event_handlers
            .fire_handlers(Event::BeginBlock(BeginBlockEvent {
                timestamp: SystemTime::now(),
                height: header.height,
                core_chain_locked_height: header.core_chain_locked_height,
            }));

        self.current = Some(current);
        self.context = Some(BlockExecutionContext::new(header));
        self.phase = Phase::Executing;
        Ok(())
    }

    /// Rebuild the shadow generation from its durable record if it is not in memory, e.g., after a
    /// restart. Does nothing if no record was ever stored.
    pub fn recover(&mut self) -> Result<(), BlockExecutionError> {
        if self.shadow.is_available() {
            return Ok(());
        }
        let group = match self.shadow_repository.fetch()? {
            Some(group) => group,
            None => return Ok(()),
        };

        let chain_info = ChainInfo::read(group.transaction(MemberName::Common))?;
        let commitment_hash = RootCommitmentTree::from_group(&group).root_hash();
        *self.shadow.write() = Some(CommittedGeneration {
            group,
            commitment_hash,
        });
        self.event_handlers
            .fire_handlers(Event::RecoverShadowState(RecoverShadowStateEvent {
                timestamp: SystemTime::now(),
                height: chain_info.last_block_height + 1,
            }));
        Ok(())
    }

    /// Get mutable access to the current generation of the executing block.
    pub fn execution(&mut self) -> Result<ExecutionScope<'_>, BlockExecutionError> {
        if self.phase != Phase::Executing {
            return Err(BlockExecutionError::NotExecuting);
        }
        match (self.current.as_mut(), self.context.as_mut()) {
            (Some(group), Some(context)) => Ok(ExecutionScope { group, context }),
            _ => Err(BlockExecutionError::NotExecuting),
        }
    }

    /// Discard the executing block.
    pub fn abort_block(&mut self, reason: &str) -> Result<(), BlockExecutionError> {
        if self.phase != Phase::Executing {
            return Err(BlockExecutionError::NotExecuting);
        }
        let height = self.executing_height();
        let current = self.current.take();
        self.reset();

        if let Some(mut current) = current {
            current.abort()?;
        }
        self.fire_abort(height, reason);
        Ok(())
    }

    /// Commit the executing block and make it the shadow generation. Returns the commitment hash of the
    /// ledger after this block.
    ///
    /// Any error returned here is fatal to the block: block processing must halt, and the block must be
    /// executed again from `begin_block`.
    pub fn commit(&mut self) -> Result<CryptoHash, BlockExecutionError> {
        if self.phase != Phase::Executing {
            return Err(BlockExecutionError::NotExecuting);
        }
        let (mut current, context) = match (self.current.take(), self.context.take()) {
            (Some(current), Some(context)) => (current, context),
            _ => {
                self.reset();
                return Err(BlockExecutionError::NotExecuting);
            }
        };
        self.phase = Phase::Committing;
        let height = context.header.height;

        let candidate = match self.commit_current(&mut current, &context) {
            Ok(candidate) => candidate,
            Err(err) => {
                if current.is_started() {
                    if let Err(abort_err) = current.abort() {
                        log::error!("Aborting the current generation failed: {}", abort_err);
                    }
                }
                return Err(self.fail_commit(height, err));
            }
        };

        let commitment_hash = RootCommitmentTree::from_group(&current).root_hash();

        if let Err(err) = self.replace_shadow_generation(height, candidate, commitment_hash) {
            return Err(self.fail_commit(height, err));
        }

        let block_fees = context.accumulated_fees;
        self.reset();
        self.event_handlers
            .fire_handlers(Event::CommitBlock(CommitBlockEvent {
                timestamp: SystemTime::now(),
                height,
                commitment_hash,
                block_fees,
            }));
        Ok(commitment_hash)
    }

    // Steps 1 to 5 of `commit`. Returns the candidate shadow generation.
    fn commit_current(
        &mut self,
        current: &mut StoreTransactionGroup,
        context: &BlockExecutionContext,
    ) -> Result<StoreTransactionGroup, BlockExecutionError> {
        let chain_info = ChainInfo::read(current.transaction(MemberName::Common))?
            .next(&context.header, context.accumulated_fees);
        chain_info.write(current.transaction_mut(MemberName::Common))?;

        self.shadow_repository
            .store_interrupted_block(&InterruptedBlock {
                height: context.header.height,
                writes: current.to_object(),
                data_contracts: context.data_contracts.clone(),
            })?;

        for contract in &context.data_contracts {
            if !self.backends.collections.exists(contract) {
                self.backends
                    .collections
                    .create(contract)
                    .map_err(|source| BlockExecutionError::CreateCollectionFailed {
                        contract: *contract,
                        source,
                    })?;
            }
        }

        let candidate = current.try_clone_into(self.shadow_repository.backends().new_group())?;

        current.commit()?;
        Ok(candidate)
    }

    // Steps 6 and 7 of `commit`. The write lock is held throughout, so queries see either the previous
    // shadow generation or `candidate`, never anything in between.
    fn replace_shadow_generation(
        &mut self,
        height: BlockHeight,
        candidate: StoreTransactionGroup,
        commitment_hash: CryptoHash,
    ) -> Result<(), BlockExecutionError> {
        let mut slot = self.shadow.write();

        if height.int() > 1 {
            if let Some(mut previous) = slot.take() {
                let mut collections = self.shadow_repository.backends().collections.clone();
                for contract in previous.group.pending_document_contracts()? {
                    if !collections.exists(&contract) {
                        collections.create(&contract).map_err(|source| {
                            BlockExecutionError::CreateCollectionFailed { contract, source }
                        })?;
                    }
                }
                previous.group.commit()?;
            }
        }

        self.shadow_repository.store(&candidate)?;
        *slot = Some(CommittedGeneration {
            group: candidate,
            commitment_hash,
        });
        Ok(())
    }

    // Report a failed commit and try to undo it right away. If that fails too, `begin_block` retries.
    fn fail_commit(&mut self, height: BlockHeight, err: BlockExecutionError) -> BlockExecutionError {
        log::error!("Commit of block {} failed: {}", height, err);
        self.reset();
        self.fire_abort(height, &err.to_string());
        if let Err(restore_err) = self.restore_interrupted_block() {
            log::error!(
                "Restoring the stores after block {} failed: {}. Retrying at the next BeginBlock.",
                height,
                restore_err
            );
        }
        err
    }

    /// Undo the writes of an interrupted commit, if there is one. See [failed commits](self#failed-commits).
    fn restore_interrupted_block(&mut self) -> Result<(), BlockExecutionError> {
        let interrupted = match self.shadow_repository.fetch_interrupted_block()? {
            Some(interrupted) => interrupted,
            None => return Ok(()),
        };
        log::warn!(
            "Restoring the stores written by the interrupted commit of block {}.",
            interrupted.height
        );

        if interrupted.height.int() > 1 {
            self.recover()?;
        }

        let mut restore = self.backends.new_group();
        restore.start()?;
        let orphaned_contracts = {
            let shadow = self.shadow.read();
            let previous = match shadow.as_ref() {
                Some(generation) => Some(&generation.group),
                // Block 1 has nothing before it.
                None if interrupted.height.int() <= 1 => None,
                None => {
                    return Err(BlockExecutionError::PreviousStateUnavailable {
                        height: interrupted.height,
                    })
                }
            };
            let previous_value = |member: MemberName, key: &[u8]| {
                previous.and_then(|group| group.transaction(member).get(key))
            };

            for (name, writes) in interrupted.writes.iter() {
                let member: MemberName = name.parse()?;
                let transaction = restore.transaction_mut(member);
                for key in writes.inserts().map(|(key, _)| key).chain(writes.deletes()) {
                    match previous_value(member, key) {
                        Some(value) => transaction.set(key, &value),
                        None => transaction.delete(key),
                    }
                    .map_err(|source| BlockExecutionError::member(member, source))?;
                }
            }

            let touched_contracts: BTreeSet<Identifier> = restore
                .pending_document_contracts()?
                .union(&interrupted.data_contracts)
                .copied()
                .collect();
            touched_contracts
                .into_iter()
                .filter(|contract| previous_value(MemberName::DataContracts, &contract.bytes()).is_none())
                .collect::<Vec<_>>()
        };

        let mut collections = self.backends.collections.clone();
        for contract in restore.pending_document_contracts()? {
            if !collections.exists(&contract) {
                collections
                    .create(&contract)
                    .map_err(|source| BlockExecutionError::CreateCollectionFailed { contract, source })?;
            }
        }
        restore.commit()?;
        for contract in orphaned_contracts {
            if collections.exists(&contract) {
                collections
                    .drop_collection(&contract)
                    .map_err(|source| BlockExecutionError::DropCollectionFailed { contract, source })?;
            }
        }

        self.shadow_repository.clear_interrupted_block()?;
        log::info!(
            "Restored the stores to their state before block {}.",
            interrupted.height
        );
        Ok(())
    }

    fn executing_height(&self) -> BlockHeight {
        self.context
            .as_ref()
            .map(|context| context.header.height)
            .unwrap_or_default()
    }

    fn fire_abort(&self, height: BlockHeight, reason: &str) {
        self.event_handlers
            .fire_handlers(Event::AbortBlock(AbortBlockEvent {
                timestamp: SystemTime::now(),
                height,
                reason: reason.to_string(),
            }));
    }

    fn reset(&mut self) {
        self.current = None;
        self.context = None;
        self.phase = Phase::Idle;
    }
}

/// Error when driving a block through the [`BlockExecutionCoordinator`].
#[derive(Debug)]
pub enum BlockExecutionError {
    /// The operation requires a block to be executing.
    NotExecuting,
    CreateCollectionFailed { contract: Identifier, source: io::Error },
    DropCollectionFailed { contract: Identifier, source: io::Error },
    ChainInfoCorrupted { source: io::Error },
    /// An interrupted commit of the block at `height` cannot be undone, because the state before it is
    /// not available.
    PreviousStateUnavailable { height: BlockHeight },
    GroupError(GroupError),
    ShadowStateError(ShadowStateError),
}

impl BlockExecutionError {
    pub(crate) fn member(member: MemberName, source: StoreError) -> Self {
        BlockExecutionError::GroupError(GroupError::Member { member, source })
    }
}

impl fmt::Display for BlockExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockExecutionError::NotExecuting => write!(f, "no block is executing"),
            BlockExecutionError::CreateCollectionFailed { contract, source } => write!(
                f,
                "cannot create document collection for contract {}: {}",
                contract, source
            ),
            BlockExecutionError::DropCollectionFailed { contract, source } => write!(
                f,
                "cannot drop document collection for contract {}: {}",
                contract, source
            ),
            BlockExecutionError::PreviousStateUnavailable { height } => write!(
                f,
                "state before block {} is unavailable, so its interrupted commit cannot be undone",
                height
            ),
            BlockExecutionError::ChainInfoCorrupted { source } => {
                write!(f, "chain info cannot be encoded or decoded: {}", source)
            }
            BlockExecutionError::GroupError(err) => write!(f, "{}", err),
            BlockExecutionError::ShadowStateError(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for BlockExecutionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlockExecutionError::NotExecuting | BlockExecutionError::PreviousStateUnavailable { .. } => None,
            BlockExecutionError::CreateCollectionFailed { source, .. }
            | BlockExecutionError::DropCollectionFailed { source, .. }
            | BlockExecutionError::ChainInfoCorrupted { source } => Some(source),
            BlockExecutionError::GroupError(err) => Some(err),
            BlockExecutionError::ShadowStateError(err) => Some(err),
        }
    }
}

impl From<GroupError> for BlockExecutionError {
    fn from(value: GroupError) -> Self {
        BlockExecutionError::GroupError(value)
    }
}

impl From<ShadowStateError> for BlockExecutionError {
    fn from(value: ShadowStateError) -> Self {
        BlockExecutionError::ShadowStateError(value)
    }
}
