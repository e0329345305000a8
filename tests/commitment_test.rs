/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for the ledger commitment and its inclusion proofs.

mod common;

use drive_rs::{
    commitment::{
        fold_path, merkle_path, merkle_root, CommitmentLeaf, RootCommitmentTree, LEAF_PREFIX,
        NODE_PREFIX,
    },
    store::group::{MemberName, StoreTransactionGroup},
    types::{crypto_primitives::sha256, data_types::CryptoHash},
};

use common::fixtures::{hash, Ledger};

fn populated_group(ledger: &Ledger) -> StoreTransactionGroup {
    let mut group = ledger.shadow.new_group();
    group.start().unwrap();
    for (key, value) in [(b"a", b"1"), (b"b", b"2"), (b"c", b"3")] {
        group.transaction_mut(MemberName::Identities).set(key, value).unwrap();
    }
    group.transaction_mut(MemberName::Common).set(b"x", b"y").unwrap();
    group
}

#[test]
fn root_of_no_leaves_is_zero() {
    assert_eq!(merkle_root(&[]), CryptoHash::new([0u8; 32]));
}

#[test]
fn empty_stores_have_zero_roots() {
    let ledger = Ledger::new();
    let mut group = ledger.shadow.new_group();
    group.start().unwrap();
    let tree = RootCommitmentTree::from_group(&group);

    assert_eq!(tree.leaves().len(), MemberName::ALL.len());
    for (leaf, member) in tree.leaves().iter().zip(MemberName::ALL) {
        assert_eq!(leaf.store_name, member.as_str());
        assert_eq!(leaf.root_hash, CryptoHash::new([0u8; 32]));
    }
}

#[test]
fn odd_nodes_are_carried_up() {
    let leaves = [hash(1), hash(2), hash(3)];
    let left = sha256(&[&[NODE_PREFIX], &hash(1).bytes(), &hash(2).bytes()]);
    let expected = sha256(&[&[NODE_PREFIX], &left.bytes(), &hash(3).bytes()]);

    assert_eq!(merkle_root(&leaves), expected);
    assert_eq!(merkle_root(&leaves[..1]), hash(1));
    for index in 0..leaves.len() {
        assert_eq!(fold_path(leaves[index], &merkle_path(&leaves, index)), expected);
    }
}

#[test]
fn leaves_and_nodes_hash_in_separate_domains() {
    let ledger = Ledger::new();
    let mut group = ledger.shadow.new_group();
    group.start().unwrap();
    group.transaction_mut(MemberName::Common).set(b"k", b"v").unwrap();
    let tree = RootCommitmentTree::from_group(&group);

    let entry = sha256(&[&[LEAF_PREFIX], &1u32.to_le_bytes(), b"k", b"v"]);
    assert_eq!(tree.leaf(MemberName::Common).root_hash, entry);

    let leaf = CommitmentLeaf {
        store_name: "common".to_string(),
        root_hash: entry,
    };
    assert_eq!(
        leaf.hash(),
        sha256(&[&[LEAF_PREFIX], b"common", &entry.bytes()])
    );

    // A pair of leaves cannot be passed off as the leaf hashing the same bytes.
    let (left, right) = (hash(1), hash(2));
    let concatenated: Vec<u8> = [left.bytes(), right.bytes()].concat();
    assert_ne!(merkle_root(&[left, right]), sha256(&[&concatenated]));
    assert_ne!(
        merkle_root(&[left, right]),
        sha256(&[&[LEAF_PREFIX], &concatenated])
    );
}

#[test]
fn commitment_covers_pending_and_committed_writes_alike() {
    let committed = Ledger::new();
    let mut group = populated_group(&committed);
    let before = RootCommitmentTree::from_group(&group).root_hash();
    group.commit().unwrap();

    let mut after = committed.shadow.new_group();
    after.start().unwrap();
    assert_eq!(RootCommitmentTree::from_group(&after).root_hash(), before);
}

#[test]
fn commitment_changes_with_any_value() {
    let ledger = Ledger::new();
    let mut group = populated_group(&ledger);
    let before = RootCommitmentTree::from_group(&group).root_hash();

    group.transaction_mut(MemberName::Identities).set(b"b", b"changed").unwrap();
    assert_ne!(RootCommitmentTree::from_group(&group).root_hash(), before);
}

#[test]
fn proofs_verify_against_the_root() {
    let ledger = Ledger::new();
    let group = populated_group(&ledger);
    let tree = RootCommitmentTree::from_group(&group);
    let root = tree.root_hash();

    let proof = tree.full_proof(MemberName::Identities, &[b"a".to_vec(), b"c".to_vec()]);
    assert_eq!(proof.leaf, *tree.leaf(MemberName::Identities));
    assert_eq!(proof.entries[0].value, Some(b"1".to_vec()));
    assert_eq!(proof.entries[1].value, Some(b"3".to_vec()));
    assert!(proof.verify(&root));

    let common = tree.full_proof(MemberName::Common, &[b"x".to_vec()]);
    assert!(common.verify(&root));
}

#[test]
fn absent_keys_are_reported_without_a_path() {
    let ledger = Ledger::new();
    let group = populated_group(&ledger);
    let tree = RootCommitmentTree::from_group(&group);

    let proof = tree.full_proof(MemberName::Identities, &[b"missing".to_vec()]);
    assert_eq!(proof.entries[0].value, None);
    assert!(proof.entries[0].path.is_empty());
    assert!(proof.verify(&tree.root_hash()));
}

#[test]
fn tampered_proofs_fail() {
    let ledger = Ledger::new();
    let group = populated_group(&ledger);
    let tree = RootCommitmentTree::from_group(&group);
    let root = tree.root_hash();
    let proof = tree.full_proof(MemberName::Identities, &[b"b".to_vec()]);

    let mut wrong_value = proof.clone();
    wrong_value.entries[0].value = Some(b"forged".to_vec());
    assert!(!wrong_value.verify(&root));

    let mut wrong_leaf = proof.clone();
    wrong_leaf.leaf.root_hash = hash(9);
    assert!(!wrong_leaf.verify(&root));

    assert!(!proof.verify(&hash(9)));
}
