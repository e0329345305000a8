//! Stubs of the base chain node: a fixed masternode list and a scripted core RPC.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use drive_rs::{
    quorum::{
        pluggables::{CoreRpcClient, CoreRpcError, CoreRpcErrorCode, MasternodeListProvider},
        rotation::QuorumError,
        types::{LlmqType, MasternodeListSnapshot, QuorumCandidate, QuorumInfo, QuorumMember},
    },
    types::data_types::{CoreHeight, CryptoHash},
};

/// Quorum type used throughout the tests.
pub(crate) const TEST_LLMQ_TYPE: LlmqType = LlmqType::LLMQ_TEST;

/// Masternode list with one snapshot per core height. Records every height it is asked for.
#[derive(Clone, Default)]
pub(crate) struct StubMasternodeList {
    snapshots: Arc<Mutex<BTreeMap<CoreHeight, MasternodeListSnapshot>>>,
    requested: Arc<Mutex<Vec<CoreHeight>>>,
}

impl StubMasternodeList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Serve a snapshot at `core_height` whose `TEST_LLMQ_TYPE` quorums are `quorum_hashes`, each with
    /// three members.
    pub(crate) fn insert(&self, core_height: CoreHeight, block_hash: CryptoHash, quorum_hashes: &[CryptoHash]) {
        let candidates = quorum_hashes
            .iter()
            .map(|quorum_hash| QuorumCandidate {
                quorum_hash: *quorum_hash,
                members: members_of(quorum_hash),
            })
            .collect();
        let mut quorums = BTreeMap::new();
        quorums.insert(TEST_LLMQ_TYPE, candidates);
        self.snapshots
            .lock()
            .unwrap()
            .insert(core_height, MasternodeListSnapshot::new(block_hash, quorums));
    }

    pub(crate) fn requested(&self) -> Vec<CoreHeight> {
        self.requested.lock().unwrap().clone()
    }
}

impl MasternodeListProvider for StubMasternodeList {
    fn snapshot_at_height(&self, core_height: CoreHeight) -> Result<MasternodeListSnapshot, QuorumError> {
        self.requested.lock().unwrap().push(core_height);
        self.snapshots
            .lock()
            .unwrap()
            .get(&core_height)
            .cloned()
            .ok_or(QuorumError::SnapshotUnavailable {
                core_height,
                reason: "no snapshot stubbed".to_string(),
            })
    }
}

/// Deterministic member `proTxHash`es of a quorum.
pub(crate) fn members_of(quorum_hash: &CryptoHash) -> Vec<CryptoHash> {
    (1..=3u8)
        .map(|i| {
            let mut bytes = quorum_hash.bytes();
            bytes[31] = i;
            CryptoHash::new(bytes)
        })
        .collect()
}

/// Core RPC that answers `quorum_info` from a fixed table, or with a fixed error code.
#[derive(Clone, Default)]
pub(crate) struct StubCoreRpc {
    quorums: Arc<Mutex<BTreeMap<CryptoHash, QuorumInfo>>>,
    error_code: Arc<Mutex<Option<i32>>>,
}

impl StubCoreRpc {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, quorum_hash: CryptoHash, members: Vec<QuorumMember>) {
        self.quorums.lock().unwrap().insert(
            quorum_hash,
            QuorumInfo {
                quorum_hash,
                members,
            },
        );
    }

    /// Make every following call fail with `code`.
    pub(crate) fn fail_with(&self, code: i32) {
        *self.error_code.lock().unwrap() = Some(code);
    }
}

impl CoreRpcClient for StubCoreRpc {
    fn quorum_info(&self, _llmq_type: LlmqType, quorum_hash: &CryptoHash) -> Result<QuorumInfo, CoreRpcError> {
        if let Some(code) = *self.error_code.lock().unwrap() {
            return Err(CoreRpcError {
                code: CoreRpcErrorCode::from_code(code),
                message: "scripted failure".to_string(),
            });
        }
        self.quorums
            .lock()
            .unwrap()
            .get(quorum_hash)
            .cloned()
            .ok_or(CoreRpcError {
                code: CoreRpcErrorCode::from_code(CoreRpcErrorCode::INVALID_PARAMETER),
                message: "quorum not found".to_string(),
            })
    }
}
