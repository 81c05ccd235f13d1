/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The pluggable [`Network`] trait.

use std::time::Duration;

use crate::types::{
    data_types::{Address, CryptoHash},
    transaction::Transaction,
    validator_set::ValidatorSet,
};

use super::messages::Message;

pub trait Network: Clone + Send + 'static {
    /// Inform the network provider of the validator set on wake-up.
    fn init_validator_set(&mut self, validator_set: ValidatorSet);

    /// Send a message to all peers without blocking.
    fn broadcast(&mut self, message: Message);

    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: Address, message: Message);

    /// Receive a message from any peer. Returns immediately with a None if no message is available now.
    fn recv(&mut self) -> Option<(Address, Message)>;

    /// Number of validators that this node can currently exchange messages with, this node included.
    fn connected_validators(&mut self) -> usize;

    /// Ask `peer` for the transactions with the given `hashes`, waiting at most `timeout` for the
    /// answer.
    ///
    /// The returned transactions are not trusted: the caller checks that they are the ones asked for.
    fn get_missing_transactions(
        &mut self,
        peer: Address,
        hashes: &[CryptoHash],
        timeout: Duration,
    ) -> Result<Vec<Transaction>, FetchTransactionsError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchTransactionsError {
    /// `peer` did not answer within the timeout.
    Timeout,
    /// `peer` could not be reached.
    Unreachable,
    /// `peer` does not have some of the transactions.
    NotFound { missing: Vec<CryptoHash> },
}
