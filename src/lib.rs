/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! State machine back end of a blockchain node.
//!
//! Drive-rs receives ordered blocks from a consensus engine, applies each block atomically to a ledger
//! spread over five stores, and serves queries from the last committed block while the next block
//! executes. It also selects the validator quorum that signs upcoming blocks, rotating it at fixed
//! block intervals.
//!
//! The entry point is the [`Application`](abci::Application). Storage engines are plugged in by
//! implementing the traits in [`store::pluggables`], and the base chain node by implementing the
//! traits in [`quorum::pluggables`].

pub mod abci;

pub mod block_execution;

pub mod commitment;

pub mod config;

pub mod events;

pub mod isolation;

pub(crate) mod logging;

pub mod query;

pub mod quorum;

pub mod shadow_state;

pub mod state_transition;

pub mod store;

pub mod types;
