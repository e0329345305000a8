/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that describe quorums, masternode list snapshots, and validator set updates.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::{CoreHeight, CryptoHash, Power};

/// Type of a long-living masternode quorum (LLMQ), e.g., `100_67` (100 members, 67 to sign).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct LlmqType(u8);

impl LlmqType {
    pub const LLMQ_50_60: LlmqType = LlmqType(1);
    pub const LLMQ_400_60: LlmqType = LlmqType(2);
    pub const LLMQ_400_85: LlmqType = LlmqType(3);
    pub const LLMQ_100_67: LlmqType = LlmqType(4);
    pub const LLMQ_TEST: LlmqType = LlmqType(100);
    pub const LLMQ_DEVNET: LlmqType = LlmqType(101);

    pub const fn new(int: u8) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u8 {
        self.0
    }
}

/// A quorum that may be selected to sign blocks: its hash and the `proTxHash`es of its members.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QuorumCandidate {
    pub quorum_hash: CryptoHash,
    pub members: Vec<CryptoHash>,
}

/// The masternode list as of one base chain height.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasternodeListSnapshot {
    block_hash: CryptoHash,
    quorums: BTreeMap<LlmqType, Vec<QuorumCandidate>>,
}

impl MasternodeListSnapshot {
    pub fn new(block_hash: CryptoHash, quorums: BTreeMap<LlmqType, Vec<QuorumCandidate>>) -> Self {
        Self { block_hash, quorums }
    }

    /// Hash of the base chain block this snapshot was taken at.
    pub fn block_hash(&self) -> &CryptoHash {
        &self.block_hash
    }

    /// Every quorum of `llmq_type` in this snapshot, in the order the base chain reported them.
    pub fn quorums_of_type(&self, llmq_type: LlmqType) -> &[QuorumCandidate] {
        self.quorums
            .get(&llmq_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn quorum_by_hash(
        &self,
        llmq_type: LlmqType,
        quorum_hash: &CryptoHash,
    ) -> Option<&QuorumCandidate> {
        self.quorums_of_type(llmq_type)
            .iter()
            .find(|quorum| quorum.quorum_hash == *quorum_hash)
    }
}

/// The currently active quorum and the inputs it was selected from.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorSetSelection {
    pub quorum_hash: CryptoHash,
    pub rotation_entropy: Vec<u8>,
    pub core_height: CoreHeight,
}

/// One member of a quorum as reported by the base chain node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumMember {
    pub pro_tx_hash: CryptoHash,
    /// BLS public key share of the member, if the base chain node knows it.
    pub public_key_share: Option<Vec<u8>>,
    pub valid: bool,
}

/// Details of a quorum as reported by the base chain node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumInfo {
    pub quorum_hash: CryptoHash,
    pub members: Vec<QuorumMember>,
}

/// One validator of the new validator set.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorUpdate {
    pub public_key_share: Vec<u8>,
    pub power: Power,
    pub pro_tx_hash: CryptoHash,
}

/// The validator set that signs the next blocks, as sent to the consensus engine.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ValidatorSetUpdate {
    pub quorum_hash: CryptoHash,
    pub validator_updates: Vec<ValidatorUpdate>,
}
