/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the application's
//! [config](crate::config::Configuration).
//!
//! Drive-rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages printed
//! onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two values are
//! always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following snippet
//! is how a [CommitBlock](crate::events::CommitBlockEvent) is printed:
//!
//! ```text
//! CommitBlock, 1701329264, 12, fNGCJyk, 340
//! ```
//!
//! In the snippet:
//! - The third value is the height of the committed block.
//! - The fourth value is the first seven characters of the Base64 encoding of the commitment hash.
//! - The fifth value is the fees paid in the block.

use std::time::SystemTime;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const BEGIN_BLOCK: &str = "BeginBlock";
pub const COMMIT_BLOCK: &str = "CommitBlock";
pub const ABORT_BLOCK: &str = "AbortBlock";
pub const RECOVER_SHADOW_STATE: &str = "RecoverShadowState";
pub const ROTATE_VALIDATOR_SET: &str = "RotateValidatorSet";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync>;
}

impl Logger for BeginBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |begin_block_event: &BeginBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                BEGIN_BLOCK,
                secs_since_unix_epoch(begin_block_event.timestamp),
                begin_block_event.height,
                begin_block_event.core_chain_locked_height.int()
            )
        };
        Box::new(logger)
    }
}

impl Logger for CommitBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |commit_block_event: &CommitBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                COMMIT_BLOCK,
                secs_since_unix_epoch(commit_block_event.timestamp),
                commit_block_event.height,
                first_seven_base64_chars(&commit_block_event.commitment_hash.bytes()),
                commit_block_event.block_fees
            )
        };
        Box::new(logger)
    }
}

impl Logger for AbortBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |abort_block_event: &AbortBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                ABORT_BLOCK,
                secs_since_unix_epoch(abort_block_event.timestamp),
                abort_block_event.height,
                abort_block_event.reason
            )
        };
        Box::new(logger)
    }
}

impl Logger for RecoverShadowStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |recover_shadow_state_event: &RecoverShadowStateEvent| {
            log::info!(
                "{}, {}, {}",
                RECOVER_SHADOW_STATE,
                secs_since_unix_epoch(recover_shadow_state_event.timestamp),
                recover_shadow_state_event.height
            )
        };
        Box::new(logger)
    }
}

impl Logger for RotateValidatorSetEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send + Sync> {
        let logger = |rotate_validator_set_event: &RotateValidatorSetEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                ROTATE_VALIDATOR_SET,
                secs_since_unix_epoch(rotate_validator_set_event.timestamp),
                rotate_validator_set_event.height,
                first_seven_base64_chars(&rotate_validator_set_event.selection.quorum_hash.bytes()),
                rotate_validator_set_event.selection.core_height.int()
            )
        };
        Box::new(logger)
    }
}

fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
