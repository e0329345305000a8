/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tests for quorum selection and rotation against stubbed base chain nodes.

mod common;

use std::num::NonZeroU64;

use drive_rs::{
    quorum::{
        rotation::{QuorumError, QuorumRotationSelector, PLACEHOLDER_PUBLIC_KEY_SHARE},
        selection::{quorum_score, select_validator_set_hash},
        types::QuorumMember,
    },
    types::data_types::{BlockHeight, CoreHeight, CryptoHash, Power},
};
use log::LevelFilter;
use rand::seq::SliceRandom;
use sha2::{Digest, Sha256};

use common::{
    fixtures::hash,
    logging::setup_logger,
    mock_core::{members_of, StubCoreRpc, StubMasternodeList, TEST_LLMQ_TYPE},
};

type Selector = QuorumRotationSelector<StubMasternodeList, StubCoreRpc>;

fn selector(masternode_list: &StubMasternodeList, core_rpc: &StubCoreRpc, interval: u64) -> Selector {
    QuorumRotationSelector::new(
        masternode_list.clone(),
        core_rpc.clone(),
        TEST_LLMQ_TYPE,
        NonZeroU64::new(interval).unwrap(),
        Power::new(100),
    )
}

fn entropy_one() -> Vec<u8> {
    let mut entropy = vec![0u8; 32];
    entropy[31] = 1;
    entropy
}

#[test]
fn score_is_sha256_of_hash_then_entropy() {
    let quorum_hash = hash(0xaa);
    let entropy = entropy_one();

    let mut hasher = Sha256::new();
    hasher.update(quorum_hash.bytes());
    hasher.update(&entropy);
    let expected: [u8; 32] = hasher.finalize().into();

    assert_eq!(quorum_score(&quorum_hash, &entropy), CryptoHash::new(expected));
}

#[test]
fn smallest_score_wins() {
    let candidates = [hash(0xaa), hash(0xbb), hash(0xcc)];
    let entropy = entropy_one();

    let expected = *candidates
        .iter()
        .min_by_key(|quorum_hash| {
            let mut hasher = Sha256::new();
            hasher.update(quorum_hash.bytes());
            hasher.update(&entropy);
            <[u8; 32]>::from(hasher.finalize())
        })
        .unwrap();

    assert_eq!(select_validator_set_hash(candidates.iter(), &entropy), Some(expected));
}

#[test]
fn selection_does_not_depend_on_candidate_order() {
    let mut rng = rand::thread_rng();
    let mut candidates: Vec<CryptoHash> = (1..=20u8).map(hash).collect();
    let entropy = entropy_one();
    let expected = select_validator_set_hash(candidates.iter(), &entropy);
    assert!(expected.is_some());

    for _ in 0..50 {
        candidates.shuffle(&mut rng);
        assert_eq!(select_validator_set_hash(candidates.iter(), &entropy), expected);
    }
}

#[test]
fn different_entropy_can_select_a_different_quorum() {
    let candidates: Vec<CryptoHash> = (1..=20u8).map(hash).collect();
    let selected: std::collections::BTreeSet<CryptoHash> = (0..32u8)
        .filter_map(|byte| select_validator_set_hash(candidates.iter(), &[byte]))
        .collect();
    assert!(selected.len() > 1);
}

#[test]
fn no_candidates_selects_nothing() {
    assert_eq!(select_validator_set_hash(std::iter::empty(), &entropy_one()), None);
}

#[test]
fn init_uses_the_base_chain_block_hash_as_entropy() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    let core_rpc = StubCoreRpc::new();
    let core_height = CoreHeight::new(1000);
    let block_hash = hash(0x42);
    let candidates = [hash(0xaa), hash(0xbb), hash(0xcc)];
    masternode_list.insert(core_height, block_hash, &candidates);

    let mut selector = selector(&masternode_list, &core_rpc, 15);
    selector.init(core_height).unwrap();

    let selection = selector.selection().unwrap();
    assert_eq!(selection.rotation_entropy, block_hash.bytes().to_vec());
    assert_eq!(selection.core_height, core_height);
    assert_eq!(
        Some(selection.quorum_hash),
        select_validator_set_hash(candidates.iter(), &block_hash.bytes())
    );

    let validator_set = selector.validator_set().unwrap();
    assert_eq!(validator_set.quorum_hash, selection.quorum_hash);
    assert_eq!(validator_set.members, members_of(&selection.quorum_hash));
}

#[test]
fn rotation_happens_only_at_multiples_of_the_interval() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    let core_rpc = StubCoreRpc::new();
    let core_height = CoreHeight::new(1000);
    masternode_list.insert(core_height, hash(0x01), &[hash(0xaa), hash(0xbb)]);

    let mut selector = selector(&masternode_list, &core_rpc, 15);
    let entropy = entropy_one();

    for (height, rotates) in [(1, false), (14, false), (15, true), (16, false), (29, false), (30, true)] {
        assert_eq!(
            selector.rotate(BlockHeight::new(height), core_height, &entropy).unwrap(),
            rotates,
            "height {}",
            height
        );
    }
    // Only rotating heights consult the masternode list.
    assert_eq!(masternode_list.requested(), vec![core_height, core_height]);
}

#[test]
fn rotation_reselects_from_the_new_snapshot() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    let core_rpc = StubCoreRpc::new();
    masternode_list.insert(CoreHeight::new(1000), hash(0x01), &[hash(0xaa)]);
    masternode_list.insert(CoreHeight::new(1015), hash(0x02), &[hash(0xbb)]);

    let mut selector = selector(&masternode_list, &core_rpc, 15);
    selector.init(CoreHeight::new(1000)).unwrap();
    assert_eq!(selector.selection().unwrap().quorum_hash, hash(0xaa));

    assert!(selector
        .rotate(BlockHeight::new(15), CoreHeight::new(1015), &entropy_one())
        .unwrap());
    let selection = selector.selection().unwrap();
    assert_eq!(selection.quorum_hash, hash(0xbb));
    assert_eq!(selection.rotation_entropy, entropy_one());
    assert_eq!(selection.core_height, CoreHeight::new(1015));
}

#[test]
fn queries_before_init_fail() {
    let selector = selector(&StubMasternodeList::new(), &StubCoreRpc::new(), 15);

    assert!(selector.selection().is_none());
    assert!(matches!(selector.validator_set(), Err(QuorumError::NotInitialized)));
    assert!(matches!(selector.validator_updates(), Err(QuorumError::NotInitialized)));
}

#[test]
fn empty_snapshot_has_no_candidates() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    masternode_list.insert(CoreHeight::new(1000), hash(0x01), &[]);
    let mut selector = selector(&masternode_list, &StubCoreRpc::new(), 15);

    assert!(matches!(
        selector.init(CoreHeight::new(1000)),
        Err(QuorumError::NoQuorumCandidates { .. })
    ));
    assert!(selector.selection().is_none());
}

#[test]
fn missing_snapshot_is_reported() {
    let mut selector = selector(&StubMasternodeList::new(), &StubCoreRpc::new(), 15);

    assert!(matches!(
        selector.init(CoreHeight::new(7)),
        Err(QuorumError::SnapshotUnavailable { .. })
    ));
}

#[test]
fn validator_updates_include_only_valid_members() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    let core_rpc = StubCoreRpc::new();
    let quorum_hash = hash(0xaa);
    masternode_list.insert(CoreHeight::new(1000), hash(0x01), &[quorum_hash]);
    let members = members_of(&quorum_hash);
    core_rpc.insert(
        quorum_hash,
        vec![
            QuorumMember {
                pro_tx_hash: members[0],
                public_key_share: Some(vec![7u8; 48]),
                valid: true,
            },
            QuorumMember {
                pro_tx_hash: members[1],
                public_key_share: Some(vec![8u8; 48]),
                valid: false,
            },
            QuorumMember {
                pro_tx_hash: members[2],
                public_key_share: None,
                valid: true,
            },
        ],
    );

    let mut selector = QuorumRotationSelector::new(
        masternode_list,
        core_rpc,
        TEST_LLMQ_TYPE,
        NonZeroU64::new(15).unwrap(),
        Power::new(250),
    );
    selector.init(CoreHeight::new(1000)).unwrap();
    let update = selector.validator_updates().unwrap();

    assert_eq!(update.quorum_hash, quorum_hash);
    assert_eq!(update.validator_updates.len(), 2);
    assert_eq!(update.validator_updates[0].pro_tx_hash, members[0]);
    assert_eq!(update.validator_updates[0].public_key_share, vec![7u8; 48]);
    assert_eq!(update.validator_updates[1].pro_tx_hash, members[2]);
    assert_eq!(
        update.validator_updates[1].public_key_share,
        PLACEHOLDER_PUBLIC_KEY_SHARE.to_vec()
    );
    assert!(update
        .validator_updates
        .iter()
        .all(|validator| validator.power == Power::new(250)));
}

#[test]
fn unknown_quorum_is_not_found() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    let quorum_hash = hash(0xaa);
    masternode_list.insert(CoreHeight::new(1000), hash(0x01), &[quorum_hash]);
    let mut selector = selector(&masternode_list, &StubCoreRpc::new(), 15);
    selector.init(CoreHeight::new(1000)).unwrap();

    match selector.validator_updates() {
        Err(QuorumError::QuorumNotFound { quorum_hash: missing }) => assert_eq!(missing, quorum_hash),
        other => panic!("expected QuorumNotFound, got {:?}", other),
    }
}

#[test]
fn other_core_rpc_failures_are_lookup_failures() {
    setup_logger(LevelFilter::Debug);
    let masternode_list = StubMasternodeList::new();
    let core_rpc = StubCoreRpc::new();
    masternode_list.insert(CoreHeight::new(1000), hash(0x01), &[hash(0xaa)]);
    core_rpc.fail_with(-32603);
    let mut selector = selector(&masternode_list, &core_rpc, 15);
    selector.init(CoreHeight::new(1000)).unwrap();

    assert!(matches!(
        selector.validator_updates(),
        Err(QuorumError::LookupFailed { .. })
    ));
}
