/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters of the [`Application`](crate::abci::Application).

use std::{num::NonZeroU64, time::Duration};

use typed_builder::TypedBuilder;

use crate::{isolation::DEFAULT_MAX_WORKERS, quorum::types::LlmqType, types::data_types::Power};

/// Number of blocks between two validator quorum rotations, unless configured otherwise.
pub const DEFAULT_ROTATION_INTERVAL: NonZeroU64 = match NonZeroU64::new(15) {
    Some(interval) => interval,
    None => panic!("rotation interval must not be zero"),
};

/// Stores the user-defined parameters of the state machine, that is:
/// 1. The type of the masternode quorums that validator sets are selected from.
/// 2. The rotation interval: the validator quorum is reselected at every block height that is a
///    multiple of it.
/// 3. The voting power given to every validator.
/// 4. The fee charged per byte of every delivered transaction.
/// 5. The wall-clock timeout and the size ceiling for decoding a transaction, and the number of decoding
///    workers that may exist at once.
/// 6. The "Log Events" flag, if set to "true" then events are logged.
#[derive(Clone, Debug, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.llmq_type(...)`

    Optional:
    - `.rotation_interval(...)`
    - `.validator_power(...)`
    - `.fee_per_byte(...)`
    - `.tx_decode_timeout(...)`
    - `.tx_max_bytes(...)`
    - `.tx_decode_max_workers(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the type of quorums that validator sets are selected from. Required."))]
    pub llmq_type: LlmqType,
    #[builder(
        default = DEFAULT_ROTATION_INTERVAL,
        setter(doc = "Set the number of blocks between quorum rotations. Defaults to 15.")
    )]
    pub rotation_interval: NonZeroU64,
    #[builder(
        default = Power::new(100),
        setter(doc = "Set the voting power of every validator. Defaults to 100.")
    )]
    pub validator_power: Power,
    #[builder(
        default = 1,
        setter(doc = "Set the fee charged per byte of a delivered transaction. Defaults to 1.")
    )]
    pub fee_per_byte: u64,
    #[builder(
        default = Duration::from_secs(1),
        setter(doc = "Set the maximum time decoding one transaction may take. Defaults to 1 second.")
    )]
    pub tx_decode_timeout: Duration,
    #[builder(
        default = 64 * 1024,
        setter(doc = "Set the maximum size in bytes of one transaction. Defaults to 64 KiB.")
    )]
    pub tx_max_bytes: usize,
    #[builder(
        default = DEFAULT_MAX_WORKERS,
        setter(doc = "Set the number of decoding workers, timed out ones included, that may exist at once. Defaults to 4.")
    )]
    pub tx_decode_max_workers: usize,
    #[builder(
        default = true,
        setter(doc = "Enable logging of events? Defaults to true.")
    )]
    pub log_events: bool,
}
