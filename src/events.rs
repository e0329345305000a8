/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Events emitted by block execution and quorum rotation, and the handlers that consume them.
//!
//! An event for a given action indicates that the action has completed. Handlers run synchronously on
//! the thread that emitted the event, so they should return quickly.

use std::time::SystemTime;

use crate::{
    logging::Logger,
    quorum::types::ValidatorSetSelection,
    types::data_types::{BlockHeight, CoreHeight, CryptoHash, Credits},
};

pub enum Event {
    BeginBlock(BeginBlockEvent),
    CommitBlock(CommitBlockEvent),
    AbortBlock(AbortBlockEvent),
    RecoverShadowState(RecoverShadowStateEvent),
    RotateValidatorSet(RotateValidatorSetEvent),
}

/// A new current generation was started for the block at `height`.
pub struct BeginBlockEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub core_chain_locked_height: CoreHeight,
}

/// The block at `height` was committed and became the shadow generation.
pub struct CommitBlockEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub commitment_hash: CryptoHash,
    /// Fees paid in this block.
    pub block_fees: Credits,
}

/// The current generation of the block at `height` was discarded.
pub struct AbortBlockEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub reason: String,
}

/// The shadow generation was rebuilt from its durable record. `height` is the height of the block after
/// the recovered one.
pub struct RecoverShadowStateEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
}

/// A new validator quorum was selected.
pub struct RotateValidatorSetEvent {
    pub timestamp: SystemTime,
    pub height: BlockHeight,
    pub selection: ValidatorSetSelection,
}

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Handlers for each kind of [`Event`].
///
/// Start from `EventHandlers::default()` and register handlers with the `on_*` methods. The default
/// loggers are added by the [`Application`](crate::abci::Application) if
/// [`log_events`](crate::config::Configuration::log_events) is set.
#[derive(Default)]
pub struct EventHandlers {
    pub(crate) begin_block_handlers: Vec<HandlerPtr<BeginBlockEvent>>,
    pub(crate) commit_block_handlers: Vec<HandlerPtr<CommitBlockEvent>>,
    pub(crate) abort_block_handlers: Vec<HandlerPtr<AbortBlockEvent>>,
    pub(crate) recover_shadow_state_handlers: Vec<HandlerPtr<RecoverShadowStateEvent>>,
    pub(crate) rotate_validator_set_handlers: Vec<HandlerPtr<RotateValidatorSetEvent>>,
}

impl EventHandlers {
    /// Register the default loggers defined in [logging](crate::logging) in addition to the handlers
    /// already held.
    pub(crate) fn add_default_loggers(&mut self) {
        self.begin_block_handlers.push(BeginBlockEvent::get_logger());
        self.commit_block_handlers.push(CommitBlockEvent::get_logger());
        self.abort_block_handlers.push(AbortBlockEvent::get_logger());
        self.recover_shadow_state_handlers
            .push(RecoverShadowStateEvent::get_logger());
        self.rotate_validator_set_handlers
            .push(RotateValidatorSetEvent::get_logger());
    }

    pub fn on_begin_block(&mut self, handler: impl Fn(&BeginBlockEvent) + Send + Sync + 'static) {
        self.begin_block_handlers.push(Box::new(handler))
    }

    pub fn on_commit_block(&mut self, handler: impl Fn(&CommitBlockEvent) + Send + Sync + 'static) {
        self.commit_block_handlers.push(Box::new(handler))
    }

    pub fn on_abort_block(&mut self, handler: impl Fn(&AbortBlockEvent) + Send + Sync + 'static) {
        self.abort_block_handlers.push(Box::new(handler))
    }

    pub fn on_recover_shadow_state(
        &mut self,
        handler: impl Fn(&RecoverShadowStateEvent) + Send + Sync + 'static,
    ) {
        self.recover_shadow_state_handlers.push(Box::new(handler))
    }

    pub fn on_rotate_validator_set(
        &mut self,
        handler: impl Fn(&RotateValidatorSetEvent) + Send + Sync + 'static,
    ) {
        self.rotate_validator_set_handlers.push(Box::new(handler))
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::BeginBlock(begin_block_event) => self
                .begin_block_handlers
                .iter()
                .for_each(|handler| handler(&begin_block_event)),

            Event::CommitBlock(commit_block_event) => self
                .commit_block_handlers
                .iter()
                .for_each(|handler| handler(&commit_block_event)),

            Event::AbortBlock(abort_block_event) => self
                .abort_block_handlers
                .iter()
                .for_each(|handler| handler(&abort_block_event)),

            Event::RecoverShadowState(recover_shadow_state_event) => self
                .recover_shadow_state_handlers
                .iter()
                .for_each(|handler| handler(&recover_shadow_state_event)),

            Event::RotateValidatorSet(rotate_validator_set_event) => self
                .rotate_validator_set_handlers
                .iter()
                .for_each(|handler| handler(&rotate_validator_set_event)),
        }
    }
}
