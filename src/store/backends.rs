//! [`StoreBackends`]: one complete set of storage backends, and the factory of groups over them.

use super::{
    documents::DocumentsTransaction,
    group::{MemberName, StoreTransactionGroup},
    pluggables::{DocumentCollections, KVStore},
    transaction::{KVStoreTransaction, StoreTransaction},
};

/// The backends of every member of a [`StoreTransactionGroup`], plus the companion document
/// collections that the `documents` member materializes into.
///
/// A node keeps two `StoreBackends`: the *current* set that block execution commits into, and the
/// *shadow* set that lags one block behind and serves queries together with the pending writes of the
/// shadow generation.
#[derive(Clone)]
pub struct StoreBackends<K: KVStore, D: DocumentCollections> {
    pub common: K,
    pub identities: K,
    pub documents: K,
    pub data_contracts: K,
    pub public_key_to_identity_id: K,
    pub collections: D,
}

impl<K: KVStore, D: DocumentCollections> StoreBackends<K, D> {
    /// Create a not-started group of transactions over these backends.
    pub fn new_group(&self) -> StoreTransactionGroup {
        StoreTransactionGroup::new([
            (
                MemberName::Common,
                Box::new(KVStoreTransaction::new(self.common.clone())) as Box<dyn StoreTransaction>,
            ),
            (
                MemberName::Identities,
                Box::new(KVStoreTransaction::new(self.identities.clone())) as Box<dyn StoreTransaction>,
            ),
            (
                MemberName::Documents,
                Box::new(DocumentsTransaction::new(
                    self.documents.clone(),
                    self.collections.clone(),
                )) as Box<dyn StoreTransaction>,
            ),
            (
                MemberName::DataContracts,
                Box::new(KVStoreTransaction::new(self.data_contracts.clone())) as Box<dyn StoreTransaction>,
            ),
            (
                MemberName::PublicKeyToIdentityId,
                Box::new(KVStoreTransaction::new(self.public_key_to_identity_id.clone()))
                    as Box<dyn StoreTransaction>,
            ),
        ])
    }

    /// Erase every key-value backend. Document collections are left to their owner.
    pub fn clear(&mut self) {
        self.common.clear();
        self.identities.clear();
        self.documents.clear();
        self.data_contracts.clear();
        self.public_key_to_identity_id.clear();
    }
}
