/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Deterministic rotation of the validator quorum.
//!
//! The validators that sign blocks are the members of one long-living masternode quorum of the base
//! chain. Every `rotation_interval` blocks, the [`QuorumRotationSelector`](rotation::QuorumRotationSelector)
//! reselects that quorum from the masternode list at the block's chain-locked core height, scoring each
//! candidate with [`quorum_score`](selection::quorum_score). Every node computes the same selection from
//! the same inputs.

pub mod pluggables;

pub mod rotation;

pub mod selection;

pub mod types;
