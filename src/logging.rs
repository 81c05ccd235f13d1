/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the node's
//! [config](crate::node::Configuration).
//!
//! isaac_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
//! printed onto a terminal or to a file, set up a
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
//! is how a [ReceiveBallot](crate::events::ReceiveBallotEvent) is printed:
//!
//! ```text
//! ReceiveBallot, 1701329264, Id5u7f6, fNGCJyk, 4-0, SIGN, YES
//! ```
//!
//! In the snippet:
//! - The third value is the first seven characters of the Base64 encoding of the address of the
//!   origin of the ballot.
//! - The fourth value is the first seven characters of the Base64 encoding of the ballot's proposer.
//! - The fifth value is the round index of the ballot, as `<height>-<round>`.
//! - The last two values are the ballot's state and vote.

use std::time::SystemTime;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

use crate::{ballot::types::Ballot, events::*};

// Names of each event in PascalCase for printing:
pub const PROPOSE_BALLOT: &str = "ProposeBallot";
pub const BROADCAST_BALLOT: &str = "BroadcastBallot";
pub const EXPIRE_BALLOT: &str = "ExpireBallot";
pub const RECEIVE_BALLOT: &str = "ReceiveBallot";
pub const TRANSIT_STATE: &str = "TransitState";
pub const CLOSE_ROUND: &str = "CloseRound";
pub const FINALIZE_BLOCK: &str = "FinalizeBlock";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ProposeBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |propose_ballot_event: &ProposeBallotEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROPOSE_BALLOT,
                secs_since_unix_epoch(propose_ballot_event.timestamp),
                ballot_info(&propose_ballot_event.ballot),
                propose_ballot_event.ballot.transactions().len(),
            )
        };
        Box::new(logger)
    }
}

impl Logger for BroadcastBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |broadcast_ballot_event: &BroadcastBallotEvent| {
            log::info!(
                "{}, {}, {}",
                BROADCAST_BALLOT,
                secs_since_unix_epoch(broadcast_ballot_event.timestamp),
                ballot_info(&broadcast_ballot_event.ballot),
            )
        };
        Box::new(logger)
    }
}

impl Logger for ExpireBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |expire_ballot_event: &ExpireBallotEvent| {
            log::info!(
                "{}, {}, {}",
                EXPIRE_BALLOT,
                secs_since_unix_epoch(expire_ballot_event.timestamp),
                ballot_info(&expire_ballot_event.ballot),
            )
        };
        Box::new(logger)
    }
}

impl Logger for ReceiveBallotEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |receive_ballot_event: &ReceiveBallotEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_BALLOT,
                secs_since_unix_epoch(receive_ballot_event.timestamp),
                first_seven_base64_chars(&receive_ballot_event.origin.bytes()),
                ballot_info(&receive_ballot_event.ballot),
            )
        };
        Box::new(logger)
    }
}

impl Logger for TransitStateEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |transit_state_event: &TransitStateEvent| {
            log::info!(
                "{}, {}, {}, {}",
                TRANSIT_STATE,
                secs_since_unix_epoch(transit_state_event.timestamp),
                transit_state_event.basis.index(),
                transit_state_event.state,
            )
        };
        Box::new(logger)
    }
}

impl Logger for CloseRoundEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |close_round_event: &CloseRoundEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                CLOSE_ROUND,
                secs_since_unix_epoch(close_round_event.timestamp),
                first_seven_base64_chars(&close_round_event.proposer.bytes()),
                close_round_event.basis.index(),
                close_round_event.vote,
            )
        };
        Box::new(logger)
    }
}

impl Logger for FinalizeBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |finalize_block_event: &FinalizeBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                FINALIZE_BLOCK,
                secs_since_unix_epoch(finalize_block_event.timestamp),
                first_seven_base64_chars(&finalize_block_event.block.hash.bytes()),
                finalize_block_event.block.height,
                finalize_block_event.block.transactions.len(),
            )
        };
        Box::new(logger)
    }
}

// Proposer, round index, state and vote of a ballot.
fn ballot_info(ballot: &Ballot) -> String {
    format!(
        "{}, {}, {}, {}",
        first_seven_base64_chars(&ballot.proposer().bytes()),
        ballot.basis().index(),
        ballot.state(),
        ballot.vote(),
    )
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
pub(crate) fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = URL_SAFE_NO_PAD.encode(bytes);
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
        .unwrap_or(0)
}
