//! Traits for the base chain node interfaces that quorum rotation consumes.

use std::fmt;

use crate::types::data_types::{CoreHeight, CryptoHash};

use super::{
    rotation::QuorumError,
    types::{LlmqType, MasternodeListSnapshot, QuorumInfo},
};

/// Source of masternode list snapshots, usually kept in sync with the base chain node.
pub trait MasternodeListProvider {
    fn snapshot_at_height(&self, core_height: CoreHeight) -> Result<MasternodeListSnapshot, QuorumError>;
}

/// RPC client of the base chain node.
pub trait CoreRpcClient {
    fn quorum_info(
        &self,
        llmq_type: LlmqType,
        quorum_hash: &CryptoHash,
    ) -> Result<QuorumInfo, CoreRpcError>;
}

/// Error code returned by the base chain node's RPC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreRpcErrorCode {
    /// The node does not know the requested quorum.
    UnknownQuorum,
    Other(i32),
}

impl CoreRpcErrorCode {
    /// RPC code the base chain node uses for an invalid parameter, e.g., an unknown quorum hash.
    pub const INVALID_PARAMETER: i32 = -8;

    pub fn from_code(code: i32) -> Self {
        if code == Self::INVALID_PARAMETER {
            CoreRpcErrorCode::UnknownQuorum
        } else {
            CoreRpcErrorCode::Other(code)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreRpcError {
    pub code: CoreRpcErrorCode,
    pub message: String,
}

impl fmt::Display for CoreRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core RPC error {:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for CoreRpcError {}
