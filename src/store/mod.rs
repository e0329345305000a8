//! The multi-store ledger and its transactions.
//!
//! # Members
//!
//! The ledger is split into five independently-transactable stores, called *members*:
//! 1. `common`: ledger-wide state such as [`ChainInfo`](crate::block_execution::ChainInfo).
//! 2. `identities`: identities by identity id.
//! 3. `documents`: the documents index, backed by a key-value store and mirrored into the companion
//!    document collection of each data contract.
//! 4. `dataContracts`: data contracts by contract id.
//! 5. `publicKeyToIdentityId`: index from public key hashes to identity ids.
//!
//! Each member exposes its atomic unit of work through the [`StoreTransaction`](transaction::StoreTransaction)
//! trait, and a block's work on all five is grouped in a
//! [`StoreTransactionGroup`](group::StoreTransactionGroup).
//!
//! # Pluggable persistence
//!
//! - The backends are chosen by the library user and must implement the traits in [`pluggables`].
//! - Where each state variable is stored is documented in [`variables`].

pub mod backends;

pub mod documents;

pub mod group;

pub mod pluggables;

pub mod transaction;

pub mod variables;
