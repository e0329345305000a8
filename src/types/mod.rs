//! Types and traits that are used across multiple components of the state machine.
//!
//! Types specific to single components, e.g., quorum candidates, live in the "types" submodules of
//! those components, e.g., [`crate::quorum::types`].

pub mod block;

pub mod crypto_primitives;

pub mod data_types;

pub mod update_sets;
