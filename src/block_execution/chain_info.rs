//! Ledger-wide metadata kept in the `common` store.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    store::{group::MemberName, transaction::StoreTransaction, variables::CHAIN_INFO},
    types::{
        block::BlockHeader,
        data_types::{BlockHeight, CoreHeight, Credits},
    },
};

use super::BlockExecutionError;

/// Progress of the chain as of the last committed block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ChainInfo {
    pub last_block_height: BlockHeight,
    pub last_core_chain_locked_height: CoreHeight,
    /// Fees paid in the last committed block.
    pub last_block_fees: Credits,
    /// Fees paid in every committed block, up to and including the last.
    pub accumulated_fees: Credits,
}

impl ChainInfo {
    /// The chain info after the block described by `header` commits with `block_fees` on top of `self`.
    ///
    /// If `self` already records that same height, its fees are replaced rather than added twice.
    pub fn next(&self, header: &BlockHeader, block_fees: Credits) -> ChainInfo {
        let previous_fees = if self.last_block_height == header.height {
            self.accumulated_fees.saturating_sub(self.last_block_fees)
        } else {
            self.accumulated_fees
        };
        ChainInfo {
            last_block_height: header.height,
            last_core_chain_locked_height: header.core_chain_locked_height,
            last_block_fees: block_fees,
            accumulated_fees: previous_fees + block_fees,
        }
    }

    /// Read the chain info visible through `common`, or the default if none was ever written.
    pub fn read(common: &dyn StoreTransaction) -> Result<ChainInfo, BlockExecutionError> {
        match common.get(&CHAIN_INFO) {
            Some(bytes) => ChainInfo::try_from_slice(&bytes)
                .map_err(|source| BlockExecutionError::ChainInfoCorrupted { source }),
            None => Ok(ChainInfo::default()),
        }
    }

    pub fn write(&self, common: &mut dyn StoreTransaction) -> Result<(), BlockExecutionError> {
        let bytes = self
            .try_to_vec()
            .map_err(|source| BlockExecutionError::ChainInfoCorrupted { source })?;
        common
            .set(&CHAIN_INFO, &bytes)
            .map_err(|source| BlockExecutionError::member(MemberName::Common, source))
    }
}
