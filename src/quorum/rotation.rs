/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! [`QuorumRotationSelector`]: keeps track of the active validator quorum and rotates it at fixed block
//! intervals.

use std::{fmt, num::NonZeroU64};

use crate::types::data_types::{BlockHeight, CoreHeight, CryptoHash, Power};

use super::{
    pluggables::{CoreRpcClient, CoreRpcError, CoreRpcErrorCode, MasternodeListProvider},
    selection::select_validator_set_hash,
    types::{
        LlmqType, MasternodeListSnapshot, QuorumCandidate, ValidatorSetSelection, ValidatorSetUpdate,
        ValidatorUpdate,
    },
};

/// Key share sent for quorum members whose BLS public key share the base chain node does not report.
pub const PLACEHOLDER_PUBLIC_KEY_SHARE: [u8; 48] = [0u8; 48];

pub struct QuorumRotationSelector<M: MasternodeListProvider, C: CoreRpcClient> {
    masternode_list: M,
    core_rpc: C,
    llmq_type: LlmqType,
    rotation_interval: NonZeroU64,
    validator_power: Power,

    // Both set together by `init` and `rotate`.
    snapshot: Option<MasternodeListSnapshot>,
    selection: Option<ValidatorSetSelection>,
}

impl<M: MasternodeListProvider, C: CoreRpcClient> QuorumRotationSelector<M, C> {
    pub fn new(
        masternode_list: M,
        core_rpc: C,
        llmq_type: LlmqType,
        rotation_interval: NonZeroU64,
        validator_power: Power,
    ) -> Self {
        Self {
            masternode_list,
            core_rpc,
            llmq_type,
            rotation_interval,
            validator_power,
            snapshot: None,
            selection: None,
        }
    }

    /// Select the active quorum from the masternode list at `core_height`, using the hash of the base
    /// chain block at that height as rotation entropy.
    pub fn init(&mut self, core_height: CoreHeight) -> Result<(), QuorumError> {
        let snapshot = self.masternode_list.snapshot_at_height(core_height)?;
        let rotation_entropy = snapshot.block_hash().bytes().to_vec();
        self.select(snapshot, core_height, rotation_entropy)
    }

    /// Reselect the active quorum from the masternode list at `core_height` if `height` is a multiple of
    /// the rotation interval. Returns whether the quorum was reselected.
    pub fn rotate(
        &mut self,
        height: BlockHeight,
        core_height: CoreHeight,
        rotation_entropy: &[u8],
    ) -> Result<bool, QuorumError> {
        if !self.is_rotation_height(height) {
            return Ok(false);
        }
        let snapshot = self.masternode_list.snapshot_at_height(core_height)?;
        self.select(snapshot, core_height, rotation_entropy.to_vec())?;
        Ok(true)
    }

    /// Select the active quorum again from the inputs `selection` was made from, e.g., after a restart.
    pub fn restore(&mut self, selection: &ValidatorSetSelection) -> Result<(), QuorumError> {
        let snapshot = self.masternode_list.snapshot_at_height(selection.core_height)?;
        self.select(snapshot, selection.core_height, selection.rotation_entropy.clone())?;
        if let Some(restored) = &self.selection {
            if restored.quorum_hash != selection.quorum_hash {
                log::warn!(
                    "Restored quorum {} differs from the persisted quorum {}.",
                    restored.quorum_hash,
                    selection.quorum_hash
                );
            }
        }
        Ok(())
    }

    pub fn is_rotation_height(&self, height: BlockHeight) -> bool {
        height.int() % self.rotation_interval.get() == 0
    }

    /// The active quorum and the inputs it was selected from, if any was selected yet.
    pub fn selection(&self) -> Option<&ValidatorSetSelection> {
        self.selection.as_ref()
    }

    /// The full record of the active quorum.
    pub fn validator_set(&self) -> Result<&QuorumCandidate, QuorumError> {
        let (snapshot, selection) = match (&self.snapshot, &self.selection) {
            (Some(snapshot), Some(selection)) => (snapshot, selection),
            _ => return Err(QuorumError::NotInitialized),
        };
        snapshot
            .quorum_by_hash(self.llmq_type, &selection.quorum_hash)
            .ok_or(QuorumError::QuorumNotFound {
                quorum_hash: selection.quorum_hash,
            })
    }

    /// Translate the active quorum into the validator set update sent to the consensus engine.
    ///
    /// Only members the base chain node reports as valid are included. Members without a known public
    /// key share get [`PLACEHOLDER_PUBLIC_KEY_SHARE`].
    pub fn validator_updates(&self) -> Result<ValidatorSetUpdate, QuorumError> {
        let quorum_hash = match &self.selection {
            Some(selection) => selection.quorum_hash,
            None => return Err(QuorumError::NotInitialized),
        };

        let quorum_info = self
            .core_rpc
            .quorum_info(self.llmq_type, &quorum_hash)
            .map_err(|source| match source.code {
                CoreRpcErrorCode::UnknownQuorum => QuorumError::QuorumNotFound { quorum_hash },
                CoreRpcErrorCode::Other(_) => QuorumError::LookupFailed {
                    quorum_hash,
                    source,
                },
            })?;

        let validator_updates = quorum_info
            .members
            .into_iter()
            .filter(|member| member.valid)
            .map(|member| ValidatorUpdate {
                public_key_share: member
                    .public_key_share
                    .unwrap_or_else(|| PLACEHOLDER_PUBLIC_KEY_SHARE.to_vec()),
                power: self.validator_power,
                pro_tx_hash: member.pro_tx_hash,
            })
            .collect();

        Ok(ValidatorSetUpdate {
            quorum_hash,
            validator_updates,
        })
    }

    fn select(
        &mut self,
        snapshot: MasternodeListSnapshot,
        core_height: CoreHeight,
        rotation_entropy: Vec<u8>,
    ) -> Result<(), QuorumError> {
        let candidates = snapshot.quorums_of_type(self.llmq_type);
        let quorum_hash = select_validator_set_hash(
            candidates.iter().map(|candidate| &candidate.quorum_hash),
            &rotation_entropy,
        )
        .ok_or(QuorumError::NoQuorumCandidates {
            llmq_type: self.llmq_type,
            core_height,
        })?;

        log::debug!(
            "Selected quorum {} out of {} candidates at core height {}",
            quorum_hash,
            candidates.len(),
            core_height
        );

        self.selection = Some(ValidatorSetSelection {
            quorum_hash,
            rotation_entropy,
            core_height,
        });
        self.snapshot = Some(snapshot);
        Ok(())
    }
}

/// Error when selecting or looking up the active quorum.
#[derive(Debug)]
pub enum QuorumError {
    /// Neither `init` nor a rotating `rotate` has run yet.
    NotInitialized,
    /// The base chain node does not know the quorum.
    QuorumNotFound { quorum_hash: CryptoHash },
    /// Looking up the quorum failed for any other reason.
    LookupFailed { quorum_hash: CryptoHash, source: CoreRpcError },
    NoQuorumCandidates { llmq_type: LlmqType, core_height: CoreHeight },
    SnapshotUnavailable { core_height: CoreHeight, reason: String },
}

impl fmt::Display for QuorumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuorumError::NotInitialized => write!(f, "validator set is not initialized"),
            QuorumError::QuorumNotFound { quorum_hash } => {
                write!(f, "quorum {} is not found", quorum_hash)
            }
            QuorumError::LookupFailed { quorum_hash, source } => {
                write!(f, "lookup of quorum {} failed: {}", quorum_hash, source)
            }
            QuorumError::NoQuorumCandidates {
                llmq_type,
                core_height,
            } => write!(
                f,
                "no quorums of type {} at core height {}",
                llmq_type.int(),
                core_height
            ),
            QuorumError::SnapshotUnavailable {
                core_height,
                reason,
            } => write!(
                f,
                "masternode list at core height {} is unavailable: {}",
                core_height, reason
            ),
        }
    }
}

impl std::error::Error for QuorumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuorumError::LookupFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
