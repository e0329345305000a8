/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ledger-wide commitment over all member stores, and inclusion proofs against it.
//!
//! # Construction
//!
//! 1. Each member store's entries, in ascending key order, are hashed into leaves
//!    `H(0x00 || len(key) || key || value)` (with `len` as 4 little-endian bytes), and the store root is
//!    the binary Merkle root over those leaves. An empty store's root is 32 zero bytes.
//! 2. Each member contributes one [`CommitmentLeaf`], hashed as `H(0x00 || store_name || store_root)`.
//! 3. The ledger commitment is the binary Merkle root over the five leaf hashes in member order.
//!
//! Interior nodes are hashed as `H(0x01 || left || right)`, so no leaf preimage can be presented as a
//! node. In every Merkle tree here, a node without a sibling is carried up to the next level unchanged.
//!
//! # Proofs
//!
//! A [`FullProof`] proves the values of some keys within one member store, and that store's leaf within
//! the ledger commitment. Absence of a key is reported but not proven.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    store::group::{MemberName, StoreTransactionGroup},
    types::{crypto_primitives::sha256, data_types::CryptoHash},
};

/// First byte of every leaf preimage.
pub const LEAF_PREFIX: u8 = 0x00;

/// First byte of every interior node preimage.
pub const NODE_PREFIX: u8 = 0x01;

/// The root hash of one member store.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct CommitmentLeaf {
    pub store_name: String,
    pub root_hash: CryptoHash,
}

impl CommitmentLeaf {
    pub fn hash(&self) -> CryptoHash {
        sha256(&[&[LEAF_PREFIX], self.store_name.as_bytes(), &self.root_hash.bytes()])
    }
}

/// Which side of the running hash a sibling sits on in a [`MerklePath`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Side {
    Left,
    Right,
}

/// Siblings from a leaf up to a Merkle root. Levels where the node had no sibling are skipped.
pub type MerklePath = Vec<(Side, CryptoHash)>;

/// Commitment over a whole [`StoreTransactionGroup`], as seen through its transactions.
pub struct RootCommitmentTree {
    leaves: Vec<CommitmentLeaf>,
    // Entry hashes and the entries themselves, per member, in key order.
    stores: BTreeMap<MemberName, Vec<(Vec<u8>, Vec<u8>)>>,
}

impl RootCommitmentTree {
    /// Compute the commitment of everything visible through `group`.
    pub fn from_group(group: &StoreTransactionGroup) -> Self {
        let mut leaves = Vec::with_capacity(MemberName::ALL.len());
        let mut stores = BTreeMap::new();
        for member in MemberName::ALL {
            let entries = group.transaction(member).entries();
            leaves.push(CommitmentLeaf {
                store_name: member.as_str().to_string(),
                root_hash: merkle_root(&entry_hashes(&entries)),
            });
            stores.insert(member, entries);
        }
        Self { leaves, stores }
    }

    pub fn leaves(&self) -> &[CommitmentLeaf] {
        &self.leaves
    }

    pub fn leaf(&self, member: MemberName) -> &CommitmentLeaf {
        &self.leaves[position(member)]
    }

    /// The combined commitment over all leaves.
    pub fn root_hash(&self) -> CryptoHash {
        merkle_root(&self.leaf_hashes())
    }

    /// Prove the values of `keys` in `member`'s store, and `member`'s leaf in the commitment.
    pub fn full_proof(&self, member: MemberName, keys: &[Vec<u8>]) -> FullProof {
        let entries = self.stores.get(&member).map(Vec::as_slice).unwrap_or(&[]);
        let hashes = entry_hashes(entries);

        let proved_entries = keys
            .iter()
            .map(
                |key| match entries.binary_search_by(|(entry_key, _)| entry_key.as_slice().cmp(key)) {
                    Ok(index) => ProvedEntry {
                        key: key.clone(),
                        value: Some(entries[index].1.clone()),
                        path: merkle_path(&hashes, index),
                    },
                    Err(_) => ProvedEntry {
                        key: key.clone(),
                        value: None,
                        path: Vec::new(),
                    },
                },
            )
            .collect();

        FullProof {
            leaf: self.leaf(member).clone(),
            entries: proved_entries,
            leaf_path: merkle_path(&self.leaf_hashes(), position(member)),
        }
    }

    fn leaf_hashes(&self) -> Vec<CryptoHash> {
        self.leaves.iter().map(CommitmentLeaf::hash).collect()
    }
}

/// One key of a [`FullProof`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ProvedEntry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
    pub path: MerklePath,
}

/// Inclusion proof for keys in one member store, combined with the proof that the store's leaf is part
/// of the ledger commitment.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct FullProof {
    pub leaf: CommitmentLeaf,
    pub entries: Vec<ProvedEntry>,
    pub leaf_path: MerklePath,
}

impl FullProof {
    /// Check this proof against the ledger commitment `root`.
    pub fn verify(&self, root: &CryptoHash) -> bool {
        if fold_path(self.leaf.hash(), &self.leaf_path) != *root {
            return false;
        }
        self.entries.iter().all(|entry| match &entry.value {
            Some(value) => fold_path(entry_hash(&entry.key, value), &entry.path) == self.leaf.root_hash,
            None => true,
        })
    }
}

fn position(member: MemberName) -> usize {
    MemberName::ALL
        .iter()
        .position(|candidate| *candidate == member)
        .unwrap_or_default()
}

fn entry_hash(key: &[u8], value: &[u8]) -> CryptoHash {
    sha256(&[&[LEAF_PREFIX], &(key.len() as u32).to_le_bytes(), key, value])
}

fn entry_hashes(entries: &[(Vec<u8>, Vec<u8>)]) -> Vec<CryptoHash> {
    entries
        .iter()
        .map(|(key, value)| entry_hash(key, value))
        .collect()
}

fn hash_pair(left: &CryptoHash, right: &CryptoHash) -> CryptoHash {
    sha256(&[&[NODE_PREFIX], &left.bytes(), &right.bytes()])
}

fn next_level(level: &[CryptoHash]) -> Vec<CryptoHash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Binary Merkle root over `leaves`. The root of no leaves is 32 zero bytes.
pub fn merkle_root(leaves: &[CryptoHash]) -> CryptoHash {
    if leaves.is_empty() {
        return CryptoHash::default();
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Path of siblings from `leaves[index]` up to the root.
pub fn merkle_path(leaves: &[CryptoHash], index: usize) -> MerklePath {
    let mut path = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = index;
    while level.len() > 1 {
        let sibling = index ^ 1;
        if sibling < level.len() {
            let side = if sibling < index { Side::Left } else { Side::Right };
            path.push((side, level[sibling]));
        }
        level = next_level(&level);
        index /= 2;
    }
    path
}

/// Recompute the root reached from `leaf` through `path`.
pub fn fold_path(leaf: CryptoHash, path: &MerklePath) -> CryptoHash {
    path.iter().fold(leaf, |acc, (side, sibling)| match side {
        Side::Left => hash_pair(sibling, &acc),
        Side::Right => hash_pair(&acc, sibling),
    })
}
