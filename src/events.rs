/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of isaac_rs events for event handling and logging.
//!
//! An event for a given action indicates that the action has been completed. Events are published by
//! the consensus threads to the [event bus](crate::event_bus), which invokes the handlers registered
//! through [`NodeSpec`](crate::node::NodeSpec) and, if enabled, the default [loggers](crate::logging).

use std::{sync::mpsc::Sender, time::SystemTime};

use crate::{
    ballot::{
        basis::VotingBasis,
        state::{BallotState, VotingHole},
        types::Ballot,
    },
    types::{block::Block, data_types::Address},
};

pub enum Event {
    // Events that involve broadcasting a ballot.
    ProposeBallot(ProposeBallotEvent),
    BroadcastBallot(BroadcastBallotEvent),
    ExpireBallot(ExpireBallotEvent),
    // Events that involve receiving a ballot.
    ReceiveBallot(ReceiveBallotEvent),
    // Events that change the node's position in the protocol.
    TransitState(TransitStateEvent),
    CloseRound(CloseRoundEvent),
    // Events that change persistent state.
    FinalizeBlock(FinalizeBlockEvent),
}

impl Event {
    /// Send this event to the event bus, if there is one.
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(event_publisher) = event_publisher {
            // The event bus may already have been shut down while the node is stopping.
            let _ = event_publisher.send(self);
        }
    }
}

/// This node proposed `ballot` as the proposer of its round.
pub struct ProposeBallotEvent {
    pub timestamp: SystemTime,
    pub ballot: Ballot,
}

/// This node signed and broadcast its SIGN or ACCEPT vote on a proposal.
pub struct BroadcastBallotEvent {
    pub timestamp: SystemTime,
    pub ballot: Ballot,
}

/// A phase timed out, and this node broadcast an `Expired` vote at the next phase.
pub struct ExpireBallotEvent {
    pub timestamp: SystemTime,
    pub ballot: Ballot,
}

/// A well-formed ballot from a known validator was received.
pub struct ReceiveBallotEvent {
    pub timestamp: SystemTime,
    pub origin: Address,
    pub ballot: Ballot,
}

/// The node's own position in the protocol changed.
pub struct TransitStateEvent {
    pub timestamp: SystemTime,
    pub basis: VotingBasis,
    pub state: BallotState,
}

/// The ACCEPT phase of the round on `basis` was decided `vote` for `proposer`.
pub struct CloseRoundEvent {
    pub timestamp: SystemTime,
    pub proposer: Address,
    pub basis: VotingBasis,
    pub vote: VotingHole,
}

/// `block` was persisted as the latest confirmed block.
pub struct FinalizeBlockEvent {
    pub timestamp: SystemTime,
    pub block: Block,
}
