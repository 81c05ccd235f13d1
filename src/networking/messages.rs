/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumeration of the messages exchanged by isaac_rs nodes.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::{ballot::types::Ballot, types::transaction::Transaction};

/// All message variants used in isaac_rs.
///
/// Payloads are carried in their JSON wire format, and only decoded by the component that processes
/// them. A payload that fails to decode is rejected like any other malformed message.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Message {
    /// A JSON-encoded [`Ballot`].
    Ballot(Vec<u8>),

    /// A JSON-encoded [`Transaction`] gossiped for inclusion in a future block.
    Transaction(Vec<u8>),
}

impl From<&Ballot> for Message {
    fn from(value: &Ballot) -> Self {
        Message::Ballot(value.to_bytes())
    }
}

impl From<&Transaction> for Message {
    fn from(value: &Transaction) -> Self {
        // Safety: every field of a transaction serializes into a JSON value.
        Message::Transaction(serde_json::to_vec(value).unwrap())
    }
}
