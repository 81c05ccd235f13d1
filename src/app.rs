/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`App`] trait: the ledger that gives transactions their meaning.
//!
//! The consensus core decides *which* transactions become the next block. The app decides whether a
//! transaction is valid, how much is minted per block, and how each transaction changes the app state.
//!
//! ## Determinism requirements
//!
//! Every method must be deterministic: given the same request, every node must get the same result.
//! Otherwise validators disagree on the validity of proposals and the network stalls.

use crate::{
    ballot::basis::VotingBasis,
    storage::{block_store::BlockStore, pluggables::KVStore},
    types::{
        block::Block, data_types::Amount, transaction::Transaction,
        update_sets::AppStateUpdates,
    },
};

pub trait App<K: KVStore>: Send + Sync + 'static {
    /// Check whether `request.transaction()` can be applied on top of the latest app state.
    fn validate_transaction(&self, request: ValidateTransactionRequest<K>) -> Result<(), AppError>;

    /// Amount minted by the proposer transaction of the block built on `basis`.
    fn inflation_amount(&self, basis: &VotingBasis) -> Amount;

    /// Apply `request.transaction()` as part of `request.block()`, returning its updates to the app
    /// state.
    fn apply_transaction(
        &self,
        request: ApplyTransactionRequest<K>,
    ) -> Result<AppStateUpdates, AppError>;
}

pub struct ValidateTransactionRequest<'a, 'b, K: KVStore> {
    transaction: &'a Transaction,
    app_state: AppStateView<'b, K>,
}

impl<'a, 'b, K: KVStore> ValidateTransactionRequest<'a, 'b, K> {
    pub(crate) fn new(transaction: &'a Transaction, app_state: AppStateView<'b, K>) -> Self {
        Self {
            transaction,
            app_state,
        }
    }

    pub fn transaction(&self) -> &Transaction {
        self.transaction
    }

    pub fn app_state(&self) -> &AppStateView<'b, K> {
        &self.app_state
    }
}

pub struct ApplyTransactionRequest<'a, 'b, K: KVStore> {
    block: &'a Block,
    transaction: &'a Transaction,
    app_state: AppStateView<'b, K>,
}

impl<'a, 'b, K: KVStore> ApplyTransactionRequest<'a, 'b, K> {
    pub(crate) fn new(
        block: &'a Block,
        transaction: &'a Transaction,
        app_state: AppStateView<'b, K>,
    ) -> Self {
        Self {
            block,
            transaction,
            app_state,
        }
    }

    /// The block being finalized.
    pub fn block(&self) -> &Block {
        self.block
    }

    pub fn transaction(&self) -> &Transaction {
        self.transaction
    }

    pub fn app_state(&self) -> &AppStateView<'b, K> {
        &self.app_state
    }
}

/// Read-only view of the app state: the committed app state, overlaid with the updates of the
/// transactions already applied earlier in the block being finalized.
pub struct AppStateView<'a, K: KVStore> {
    block_store: &'a BlockStore<K>,
    pending: Option<&'a AppStateUpdates>,
}

impl<'a, K: KVStore> AppStateView<'a, K> {
    pub(crate) fn new(block_store: &'a BlockStore<K>, pending: Option<&'a AppStateUpdates>) -> Self {
        Self {
            block_store,
            pending,
        }
    }

    pub fn app_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(pending) = self.pending {
            if pending.contains_delete(key) {
                return None;
            } else if let Some(value) = pending.get_insert(key) {
                return Some(value.clone());
            }
        }
        self.block_store.app_state(key)
    }
}

/// Why the app rejected a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// The transaction is invalid in the current app state.
    InvalidTransaction { reason: String },
    /// The app could not read the state it needs.
    StateUnavailable { reason: String },
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InvalidTransaction { reason } => write!(f, "invalid transaction: {reason}"),
            AppError::StateUnavailable { reason } => write!(f, "app state unavailable: {reason}"),
        }
    }
}
