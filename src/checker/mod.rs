/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Processing of inbound messages.
//!
//! A single checker thread consumes every message received from the network, in the order the poller
//! forwards them. Ballots go through the [`BallotChecker`](ballot_checker::BallotChecker) pipelines.
//! Transactions are admitted into the transaction pool if they are valid.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    app::{App, AppError, AppStateView, ValidateTransactionRequest},
    ballot::types::{Ballot, BallotError},
    consensus::isaac::IsaacError,
    networking::{messages::Message, network::Network},
    storage::{block_store::BlockStore, pluggables::KVStore},
    transaction_pool::TransactionPool,
    types::{
        data_types::{Address, NetworkID},
        transaction::{Transaction, TransactionError},
    },
};

use self::{ballot_checker::BallotChecker, finish::FinishError};

pub mod ballot_checker;

pub mod finish;

pub(crate) mod pipeline;

/// Add `transaction` to `pool` if it is well formed, not already confirmed, and valid according to
/// `app`.
///
/// Returns whether the transaction was added. A transaction that is already pooled or confirmed is
/// not an error.
pub(crate) fn admit_transaction<K: KVStore, A: App<K>>(
    transaction: Transaction,
    network_id: &NetworkID,
    block_store: &BlockStore<K>,
    app: &A,
    pool: &TransactionPool,
) -> Result<bool, CheckerError> {
    transaction.is_well_formed(network_id)?;
    if pool.contains(&transaction.hash()) || block_store.contains_transaction(&transaction.hash()) {
        return Ok(false);
    }
    app.validate_transaction(ValidateTransactionRequest::new(
        &transaction,
        AppStateView::new(block_store, None),
    ))?;
    Ok(pool.add(transaction))
}

/// Start the checker thread, which processes every ballot on `own_ballots` and every message received
/// on `messages` until a shutdown signal is received.
pub(crate) fn start_checker<K: KVStore, A: App<K>, N: Network>(
    mut checker: BallotChecker<K, A, N>,
    messages: Receiver<(Address, Message)>,
    own_ballots: Receiver<Ballot>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Checker thread disconnected from main thread")
            }
        }

        while let Ok(ballot) = own_ballots.try_recv() {
            match checker.check_own(ballot) {
                Ok(None) => (),
                Ok(Some(stop)) => log::debug!("Stopped checking an own ballot: {:?}", stop),
                Err(CheckerError::Finish(err)) => {
                    log::error!("Failed to finalize a block: {:?}", err)
                }
                Err(err) => log::warn!("Failed to check an own ballot: {:?}", err),
            }
        }

        match messages.recv_timeout(Duration::from_millis(10)) {
            Ok((origin, Message::Ballot(bytes))) => match checker.check(origin, &bytes) {
                Ok(None) => (),
                Ok(Some(stop)) => log::debug!("Stopped checking a ballot from {}: {:?}", origin, stop),
                Err(CheckerError::Finish(err)) => {
                    log::error!("Failed to finalize a block: {:?}", err)
                }
                Err(err) => log::warn!("Rejected a ballot from {}: {:?}", origin, err),
            },
            Ok((origin, Message::Transaction(bytes))) => match checker.receive_transaction(&bytes) {
                Ok(_) => (),
                Err(err) => log::debug!("Rejected a transaction from {}: {:?}", origin, err),
            },
            Err(RecvTimeoutError::Timeout) => (),
            // The poller is stopped after the checker, so it only disconnects early if it panicked.
            // `Node::drop` still sends this thread its shutdown signal, so it must stay alive until then.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(Duration::from_millis(50)),
        }
    })
}

#[derive(Debug)]
pub enum CheckerError {
    /// The ballot could not be decoded, or is not well formed.
    Ballot(BallotError),
    /// The ballot was signed by a node that is not a validator.
    UnknownValidator { source: Address },
    Isaac(IsaacError),
    Finish(FinishError),
    /// The transaction could not be decoded.
    DecodeTransaction(serde_json::Error),
    Transaction(TransactionError),
    App(AppError),
}

impl From<BallotError> for CheckerError {
    fn from(value: BallotError) -> Self {
        CheckerError::Ballot(value)
    }
}

impl From<IsaacError> for CheckerError {
    fn from(value: IsaacError) -> Self {
        CheckerError::Isaac(value)
    }
}

impl From<FinishError> for CheckerError {
    fn from(value: FinishError) -> Self {
        CheckerError::Finish(value)
    }
}

impl From<serde_json::Error> for CheckerError {
    fn from(value: serde_json::Error) -> Self {
        CheckerError::DecodeTransaction(value)
    }
}

impl From<TransactionError> for CheckerError {
    fn from(value: TransactionError) -> Self {
        CheckerError::Transaction(value)
    }
}

impl From<AppError> for CheckerError {
    fn from(value: AppError) -> Self {
        CheckerError::App(value)
    }
}
