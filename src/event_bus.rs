/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives published [events](crate::events) and invokes the handlers registered for them.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{events::*, logging::Logger};

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Handlers registered for each event type. The default loggers, when enabled, are registered first.
pub(crate) struct EventHandlers {
    pub(crate) propose_ballot_handlers: Vec<HandlerPtr<ProposeBallotEvent>>,
    pub(crate) broadcast_ballot_handlers: Vec<HandlerPtr<BroadcastBallotEvent>>,
    pub(crate) expire_ballot_handlers: Vec<HandlerPtr<ExpireBallotEvent>>,
    pub(crate) receive_ballot_handlers: Vec<HandlerPtr<ReceiveBallotEvent>>,
    pub(crate) transit_state_handlers: Vec<HandlerPtr<TransitStateEvent>>,
    pub(crate) close_round_handlers: Vec<HandlerPtr<CloseRoundEvent>>,
    pub(crate) finalize_block_handlers: Vec<HandlerPtr<FinalizeBlockEvent>>,
}

impl EventHandlers {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        log_events: bool,
        propose_ballot_handler: Option<HandlerPtr<ProposeBallotEvent>>,
        broadcast_ballot_handler: Option<HandlerPtr<BroadcastBallotEvent>>,
        expire_ballot_handler: Option<HandlerPtr<ExpireBallotEvent>>,
        receive_ballot_handler: Option<HandlerPtr<ReceiveBallotEvent>>,
        transit_state_handler: Option<HandlerPtr<TransitStateEvent>>,
        close_round_handler: Option<HandlerPtr<CloseRoundEvent>>,
        finalize_block_handler: Option<HandlerPtr<FinalizeBlockEvent>>,
    ) -> EventHandlers {
        fn handlers<T: Logger>(log_events: bool, handler: Option<HandlerPtr<T>>) -> Vec<HandlerPtr<T>> {
            let mut handlers = Vec::new();
            if log_events {
                handlers.push(T::get_logger());
            }
            handlers.extend(handler);
            handlers
        }

        EventHandlers {
            propose_ballot_handlers: handlers(log_events, propose_ballot_handler),
            broadcast_ballot_handlers: handlers(log_events, broadcast_ballot_handler),
            expire_ballot_handlers: handlers(log_events, expire_ballot_handler),
            receive_ballot_handlers: handlers(log_events, receive_ballot_handler),
            transit_state_handlers: handlers(log_events, transit_state_handler),
            close_round_handlers: handlers(log_events, close_round_handler),
            finalize_block_handlers: handlers(log_events, finalize_block_handler),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.propose_ballot_handlers.is_empty()
            && self.broadcast_ballot_handlers.is_empty()
            && self.expire_ballot_handlers.is_empty()
            && self.receive_ballot_handlers.is_empty()
            && self.transit_state_handlers.is_empty()
            && self.close_round_handlers.is_empty()
            && self.finalize_block_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::ProposeBallot(propose_ballot_event) => self
                .propose_ballot_handlers
                .iter()
                .for_each(|handler| handler(&propose_ballot_event)),

            Event::BroadcastBallot(broadcast_ballot_event) => self
                .broadcast_ballot_handlers
                .iter()
                .for_each(|handler| handler(&broadcast_ballot_event)),

            Event::ExpireBallot(expire_ballot_event) => self
                .expire_ballot_handlers
                .iter()
                .for_each(|handler| handler(&expire_ballot_event)),

            Event::ReceiveBallot(receive_ballot_event) => self
                .receive_ballot_handlers
                .iter()
                .for_each(|handler| handler(&receive_ballot_event)),

            Event::TransitState(transit_state_event) => self
                .transit_state_handlers
                .iter()
                .for_each(|handler| handler(&transit_state_event)),

            Event::CloseRound(close_round_event) => self
                .close_round_handlers
                .iter()
                .for_each(|handler| handler(&close_round_event)),

            Event::FinalizeBlock(finalize_block_event) => self
                .finalize_block_handlers
                .iter()
                .for_each(|handler| handler(&finalize_block_event)),
        }
    }
}

/// Start the event bus thread, which fires the handlers of every event received on
/// `event_subscriber` until a shutdown signal is received.
pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("event_bus thread disconnected from main thread")
            }
        }

        match event_subscriber.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => event_handlers.fire_handlers(event),
            Err(RecvTimeoutError::Timeout) => (),
            // Every publisher has stopped. Wait for the shutdown signal.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(Duration::from_millis(50)),
        }
    })
}
