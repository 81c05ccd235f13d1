/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions and types for sending messages to the P2P network.

use std::time::Duration;

use crate::types::{
    data_types::{Address, CryptoHash},
    transaction::Transaction,
};

use super::{
    messages::Message,
    network::{FetchTransactionsError, Network},
};

/// Handle for sending and broadcasting messages to the [`Network`].
///
/// It can be used to send or broadcast instances of any type that implement the [`Into<Message>`]
/// trait.
#[derive(Clone)]
pub(crate) struct SenderHandle<N: Network> {
    network: N,
}

impl<N: Network> SenderHandle<N> {
    pub(crate) fn new(network: N) -> Self {
        Self { network }
    }

    pub(crate) fn send<S: Into<Message>>(&mut self, peer: Address, msg: S) {
        self.network.send(peer, msg.into())
    }

    pub(crate) fn broadcast<S: Into<Message>>(&mut self, msg: S) {
        self.network.broadcast(msg.into())
    }

    pub(crate) fn connected_validators(&mut self) -> usize {
        self.network.connected_validators()
    }

    pub(crate) fn get_missing_transactions(
        &mut self,
        peer: Address,
        hashes: &[CryptoHash],
        timeout: Duration,
    ) -> Result<Vec<Transaction>, FetchTransactionsError> {
        self.network.get_missing_transactions(peer, hashes, timeout)
    }
}
