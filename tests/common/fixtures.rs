//! Construction of ledgers, headers, and identifiers for tests.

use std::sync::Arc;

use drive_rs::{
    block_execution::BlockExecutionCoordinator,
    events::EventHandlers,
    shadow_state::ShadowStateRepository,
    store::backends::StoreBackends,
    types::{
        block::BlockHeader,
        data_types::{BlockHeight, CoreHeight, CryptoHash, Identifier, ProtocolVersion},
    },
};

use super::{mem_collections::MemCollections, mem_db::MemDB};

pub(crate) type MemBackends = StoreBackends<MemDB, MemCollections>;

pub(crate) fn mem_backends() -> MemBackends {
    StoreBackends {
        common: MemDB::new(),
        identities: MemDB::new(),
        documents: MemDB::new(),
        data_contracts: MemDB::new(),
        public_key_to_identity_id: MemDB::new(),
        collections: MemCollections::new(),
    }
}

/// Everything a node persists: the current backends, the shadow backends, and the metadata store that
/// holds the shadow state record. Cloning a `Ledger` shares its storage, like restarting a process over
/// the same database.
#[derive(Clone)]
pub(crate) struct Ledger {
    pub(crate) current: MemBackends,
    pub(crate) shadow: MemBackends,
    pub(crate) metadata: MemDB,
}

impl Ledger {
    pub(crate) fn new() -> Ledger {
        Ledger {
            current: mem_backends(),
            shadow: mem_backends(),
            metadata: MemDB::new(),
        }
    }

    pub(crate) fn repository(&self) -> ShadowStateRepository<MemDB, MemCollections> {
        ShadowStateRepository::new(self.metadata.clone(), self.shadow.clone())
    }

    /// A freshly started coordinator over this ledger, with no shadow generation in memory.
    pub(crate) fn coordinator(&self) -> BlockExecutionCoordinator<MemDB, MemCollections> {
        self.coordinator_with(EventHandlers::default())
    }

    pub(crate) fn coordinator_with(
        &self,
        event_handlers: EventHandlers,
    ) -> BlockExecutionCoordinator<MemDB, MemCollections> {
        BlockExecutionCoordinator::new(self.current.clone(), self.repository(), Arc::new(event_handlers))
    }
}

pub(crate) fn header(height: u64) -> BlockHeader {
    BlockHeader {
        height: BlockHeight::new(height),
        core_chain_locked_height: CoreHeight::new(1000 + height as u32),
        version: ProtocolVersion::new(1),
        time_ms: 1_700_000_000_000 + height * 1000,
        last_commit_hash: hash(height as u8),
    }
}

pub(crate) fn id(byte: u8) -> Identifier {
    Identifier::new([byte; 32])
}

pub(crate) fn hash(byte: u8) -> CryptoHash {
    CryptoHash::new([byte; 32])
}
