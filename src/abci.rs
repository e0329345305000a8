/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Application`]: the block protocol surface that the consensus engine drives.
//!
//! For every block, the consensus engine calls [`begin_block`](Application::begin_block), then
//! [`deliver_tx`](Application::deliver_tx) once per transaction, then
//! [`end_block`](Application::end_block) and [`commit`](Application::commit). Blocks are processed one
//! at a time. [`query`](Application::query) may be called at any time and always answers from the last
//! committed block.
//!
//! A restarted process calls [`info`](Application::info) first. That rebuilds the shadow generation from
//! its durable record and selects the active validator quorum again from the inputs persisted with the
//! last committed block, so the validator set is available before the next rotation height.
//!
//! Transport and envelope encoding are left to the caller: this module takes and returns plain Rust
//! values.

use std::{fmt, io, sync::Arc, time::SystemTime};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    block_execution::{BlockExecutionCoordinator, BlockExecutionError, ChainInfo},
    commitment::FullProof,
    config::Configuration,
    events::{Event, EventHandlers, RotateValidatorSetEvent},
    isolation::IsolatedDecoder,
    query::QueryHandler,
    quorum::{
        pluggables::{CoreRpcClient, MasternodeListProvider},
        rotation::{QuorumError, QuorumRotationSelector},
        types::{ValidatorSetSelection, ValidatorSetUpdate},
    },
    shadow_state::ShadowStateRepository,
    state_transition::StateTransition,
    store::{
        backends::StoreBackends,
        group::MemberName,
        pluggables::{DocumentCollections, KVStore},
        transaction::StoreTransaction,
        variables::VALIDATOR_SET_SELECTION,
    },
    types::{
        block::BlockHeader,
        data_types::{BlockHeight, CoreHeight, CryptoHash, Credits},
    },
};

/// Response code of a transaction or query that succeeded.
pub const CODE_OK: u32 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseInitChain {
    pub validator_set_update: ValidatorSetUpdate,
    pub initial_core_height: CoreHeight,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseInfo {
    pub last_block_height: BlockHeight,
    pub last_core_chain_locked_height: CoreHeight,
    pub last_block_fees: Credits,
    pub accumulated_fees: Credits,
    /// Commitment hash of the last committed block, or all zeros if no block was committed.
    pub last_block_app_hash: CryptoHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseDeliverTx {
    /// [`CODE_OK`], or the code of the reason the transaction was rejected.
    pub code: u32,
    pub info: String,
    pub fee: Credits,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseEndBlock {
    /// The new validator set, if the validator quorum rotated at this block.
    pub validator_set_update: Option<ValidatorSetUpdate>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseCommit {
    pub app_hash: CryptoHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestQuery {
    pub path: String,
    pub data: Vec<u8>,
    pub prove: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseQuery {
    pub code: u32,
    pub info: String,
    pub value: Option<Vec<u8>>,
    pub proof: Option<FullProof>,
    pub commitment_hash: CryptoHash,
}

pub struct Application<K, D, M, C>
where
    K: KVStore,
    D: DocumentCollections,
    M: MasternodeListProvider,
    C: CoreRpcClient,
{
    coordinator: BlockExecutionCoordinator<K, D>,
    selector: QuorumRotationSelector<M, C>,
    query_handler: QueryHandler,
    decoder: IsolatedDecoder,
    fee_per_byte: u64,
    event_handlers: Arc<EventHandlers>,
}

impl<K, D, M, C> Application<K, D, M, C>
where
    K: KVStore,
    D: DocumentCollections,
    M: MasternodeListProvider,
    C: CoreRpcClient,
{
    /// Compose an application out of its parts.
    ///
    /// `backends` receive committed blocks. `shadow_repository` holds the backends that lag one block
    /// behind and the durable record of the shadow generation.
    pub fn new(
        configuration: Configuration,
        backends: StoreBackends<K, D>,
        shadow_repository: ShadowStateRepository<K, D>,
        masternode_list: M,
        core_rpc: C,
        event_handlers: EventHandlers,
    ) -> Self {
        let mut event_handlers = event_handlers;
        if configuration.log_events {
            event_handlers.add_default_loggers();
        }
        let event_handlers = Arc::new(event_handlers);

        let coordinator =
            BlockExecutionCoordinator::new(backends, shadow_repository, event_handlers.clone());
        let query_handler = QueryHandler::new(coordinator.shadow_generation());
        let selector = QuorumRotationSelector::new(
            masternode_list,
            core_rpc,
            configuration.llmq_type,
            configuration.rotation_interval,
            configuration.validator_power,
        );

        Self {
            coordinator,
            selector,
            query_handler,
            decoder: IsolatedDecoder::new(configuration.tx_decode_timeout, configuration.tx_max_bytes)
                .with_max_workers(configuration.tx_decode_max_workers),
            fee_per_byte: configuration.fee_per_byte,
            event_handlers,
        }
    }

    /// Select the initial validator set.
    pub fn init_chain(&mut self, initial_core_height: CoreHeight) -> Result<ResponseInitChain, AbciError> {
        self.selector.init(initial_core_height)?;
        self.fire_rotation(BlockHeight::new(0));
        Ok(ResponseInitChain {
            validator_set_update: self.selector.validator_updates()?,
            initial_core_height,
        })
    }

    /// Describe the last committed block, recovering what a restarted process lost first.
    pub fn info(&mut self) -> Result<ResponseInfo, AbciError> {
        self.recover()?;

        let shadow = self.coordinator.shadow_generation();
        let guard = shadow.read();
        let (chain_info, last_block_app_hash) = match guard.as_ref() {
            Some(generation) => (
                ChainInfo::read(generation.transaction(MemberName::Common))?,
                generation.commitment_hash(),
            ),
            None => (ChainInfo::default(), CryptoHash::default()),
        };
        Ok(ResponseInfo {
            last_block_height: chain_info.last_block_height,
            last_core_chain_locked_height: chain_info.last_core_chain_locked_height,
            last_block_fees: chain_info.last_block_fees,
            accumulated_fees: chain_info.accumulated_fees,
            last_block_app_hash,
        })
    }

    pub fn begin_block(&mut self, header: BlockHeader) -> Result<(), AbciError> {
        self.coordinator.begin_block(header)?;
        self.restore_selection()?;
        Ok(())
    }

    /// Decode, validate, and apply one transaction.
    ///
    /// Transactions that cannot be decoded or fail validation are rejected with a non-zero code and leave
    /// the block untouched. Errors are returned only when the block itself cannot proceed.
    pub fn deliver_tx(&mut self, tx: &[u8]) -> Result<ResponseDeliverTx, AbciError> {
        let transition = match self.decoder.decode::<StateTransition>(tx) {
            Ok(transition) => transition,
            Err(err) => return Ok(rejected(err.code(), err.to_string())),
        };

        let mut scope = self.coordinator.execution()?;
        if let Err(err) = transition.validate(&scope) {
            return Ok(rejected(err.code(), err.to_string()));
        }
        transition.apply(&mut scope)?;

        let fee = Credits::new((tx.len() as u64).saturating_mul(self.fee_per_byte));
        scope.add_fees(fee);
        Ok(ResponseDeliverTx {
            code: CODE_OK,
            info: String::new(),
            fee,
        })
    }

    /// Rotate the validator quorum if this block is at a rotation height, using the previous block's
    /// commit hash as rotation entropy.
    pub fn end_block(&mut self) -> Result<ResponseEndBlock, AbciError> {
        let header = self.coordinator.execution()?.header().clone();
        let rotated = self.selector.rotate(
            header.height,
            header.core_chain_locked_height,
            &header.last_commit_hash.bytes(),
        )?;

        // Persisted with every block, so that a restarted process selects the same quorum again.
        if let Some(selection) = self.selector.selection() {
            let bytes = selection
                .try_to_vec()
                .map_err(|source| AbciError::SelectionCorrupted { source })?;
            self.coordinator
                .execution()?
                .set(MemberName::Common, &VALIDATOR_SET_SELECTION, &bytes)?;
        }

        if !rotated {
            return Ok(ResponseEndBlock {
                validator_set_update: None,
            });
        }

        self.fire_rotation(header.height);
        Ok(ResponseEndBlock {
            validator_set_update: Some(self.selector.validator_updates()?),
        })
    }

    pub fn commit(&mut self) -> Result<ResponseCommit, AbciError> {
        Ok(ResponseCommit {
            app_hash: self.coordinator.commit()?,
        })
    }

    /// Answer a query from the last committed block. Failures are reported through the response code.
    pub fn query(&self, request: &RequestQuery) -> ResponseQuery {
        match self
            .query_handler
            .query(&request.path, &request.data, request.prove)
        {
            Ok(response) => ResponseQuery {
                code: CODE_OK,
                info: String::new(),
                value: response.value,
                proof: response.proof,
                commitment_hash: response.commitment_hash,
            },
            Err(err) => ResponseQuery {
                code: err.code(),
                info: err.to_string(),
                value: None,
                proof: None,
                commitment_hash: CryptoHash::default(),
            },
        }
    }

    pub fn coordinator(&self) -> &BlockExecutionCoordinator<K, D> {
        &self.coordinator
    }

    pub fn selector(&self) -> &QuorumRotationSelector<M, C> {
        &self.selector
    }

    fn recover(&mut self) -> Result<(), AbciError> {
        self.coordinator.recover()?;
        self.restore_selection()
    }

    // Select the persisted quorum again if none is selected in memory.
    fn restore_selection(&mut self) -> Result<(), AbciError> {
        if self.selector.selection().is_some() {
            return Ok(());
        }
        let persisted = {
            let shadow = self.coordinator.shadow_generation();
            let guard = shadow.read();
            match guard.as_ref() {
                Some(generation) => read_selection(generation.transaction(MemberName::Common))?,
                None => None,
            }
        };
        if let Some(selection) = persisted {
            log::info!(
                "Restoring validator set selected at core height {}.",
                selection.core_height
            );
            self.selector.restore(&selection)?;
        }
        Ok(())
    }

    fn fire_rotation(&self, height: BlockHeight) {
        if let Some(selection) = self.selector.selection() {
            self.event_handlers
                .fire_handlers(Event::RotateValidatorSet(RotateValidatorSetEvent {
                    timestamp: SystemTime::now(),
                    height,
                    selection: selection.clone(),
                }));
        }
    }
}

fn read_selection(common: &dyn StoreTransaction) -> Result<Option<ValidatorSetSelection>, AbciError> {
    common
        .get(&VALIDATOR_SET_SELECTION)
        .map(|bytes| ValidatorSetSelection::try_from_slice(&bytes))
        .transpose()
        .map_err(|source| AbciError::SelectionCorrupted { source })
}

fn rejected(code: u32, info: String) -> ResponseDeliverTx {
    ResponseDeliverTx {
        code,
        info,
        fee: Credits::new(0),
    }
}

/// Error that halts block processing.
#[derive(Debug)]
pub enum AbciError {
    BlockExecutionError(BlockExecutionError),
    QuorumError(QuorumError),
    /// The persisted validator set selection cannot be encoded or decoded.
    SelectionCorrupted { source: io::Error },
}

impl fmt::Display for AbciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbciError::BlockExecutionError(err) => write!(f, "block execution failed: {}", err),
            AbciError::QuorumError(err) => write!(f, "quorum rotation failed: {}", err),
            AbciError::SelectionCorrupted { source } => {
                write!(f, "validator set selection cannot be encoded or decoded: {}", source)
            }
        }
    }
}

impl std::error::Error for AbciError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AbciError::BlockExecutionError(err) => Some(err),
            AbciError::QuorumError(err) => Some(err),
            AbciError::SelectionCorrupted { source } => Some(source),
        }
    }
}

impl From<BlockExecutionError> for AbciError {
    fn from(value: BlockExecutionError) -> Self {
        AbciError::BlockExecutionError(value)
    }
}

impl From<QuorumError> for AbciError {
    fn from(value: QuorumError) -> Self {
        AbciError::QuorumError(value)
    }
}
