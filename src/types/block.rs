/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition of the block header delivered by the consensus engine in `BeginBlock`.

use borsh::{BorshDeserialize, BorshSerialize};

use super::data_types::{BlockHeight, CoreHeight, CryptoHash, ProtocolVersion};

/// The parts of a block header that the state machine reads.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    pub height: BlockHeight,

    /// Height of the base chain that the consensus engine has a chain lock for. Quorums are taken from
    /// the masternode list at this height.
    pub core_chain_locked_height: CoreHeight,

    pub version: ProtocolVersion,

    /// Block time in milliseconds since the Unix Epoch.
    pub time_ms: u64,

    /// Hash of the previous block's commit. Used as rotation entropy when the validator quorum rotates
    /// at the end of this block.
    pub last_commit_hash: CryptoHash,
}
