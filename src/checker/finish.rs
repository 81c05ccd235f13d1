/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Block finalization: turning an accepted proposal into the next persisted [`Block`].

use crate::{
    app::{App, AppError, AppStateView, ApplyTransactionRequest, ValidateTransactionRequest},
    ballot::{basis::VotingBasis, types::Ballot},
    storage::{
        block_store::{BlockStore, BlockStoreError},
        pluggables::KVStore,
    },
    transaction_pool::TransactionPool,
    types::{
        block::Block,
        data_types::{Address, CryptoHash, Timestamp},
        transaction::Transaction,
        update_sets::AppStateUpdates,
    },
};

/// Build the block proposed by `proposal` on top of `latest_block`, and persist it together with its
/// transactions and their effects on the app state, in a single write batch.
///
/// Nothing is written if any step fails.
pub(crate) fn finish_ballot<K: KVStore, A: App<K>>(
    proposal: &Ballot,
    latest_block: &Block,
    block_store: &mut BlockStore<K>,
    app: &A,
    pool: &TransactionPool,
) -> Result<Block, FinishError> {
    if !proposal.basis().extends(latest_block) {
        return Err(FinishError::StaleBasis);
    }

    let transactions = proposal
        .transactions()
        .iter()
        .map(|hash| pool.get(hash).ok_or(FinishError::MissingTransaction { hash: *hash }))
        .collect::<Result<Vec<Transaction>, FinishError>>()?;
    let proposer_transaction = proposal.proposer_transaction().transaction();
    let block = proposed_block(proposal, &transactions);

    let mut state = PendingAppState::new(block_store, app);
    for transaction in transactions.iter().chain(std::iter::once(proposer_transaction)) {
        state
            .apply(&block, transaction)
            .map_err(|err| FinishError::App {
                transaction: transaction.hash(),
                source: err,
            })?;
    }
    let updates = state.into_updates();

    let mut wb = block_store.write_batch();
    wb.set_block(&block)?;
    for transaction in transactions.iter().chain(std::iter::once(proposer_transaction)) {
        wb.set_transaction(transaction)?;
    }
    wb.apply_app_state_updates(&updates);
    wb.set_latest_block(&block.hash)?;

    block_store.write(wb);
    Ok(block)
}

/// The block that `proposal` becomes once `transactions`, the transactions it names, are available.
pub(crate) fn proposed_block(proposal: &Ballot, transactions: &[Transaction]) -> Block {
    build_block(
        proposal.basis(),
        *proposal.proposer(),
        transactions,
        proposal.proposer_transaction().transaction(),
        proposal.proposed_confirmed(),
    )
}

/// The block built on `basis` from `transactions` and the proposer transaction of `proposer`.
pub(crate) fn build_block(
    basis: &VotingBasis,
    proposer: Address,
    transactions: &[Transaction],
    proposer_transaction: &Transaction,
    proposed_time: Timestamp,
) -> Block {
    let operations: u64 = transactions
        .iter()
        .map(|tx| tx.operations().len() as u64)
        .sum();
    Block::new(
        basis.height + 1,
        basis.round,
        basis.block_hash,
        proposer,
        transactions.iter().map(|tx| tx.hash()).collect(),
        proposer_transaction.hash(),
        basis.total_txs + transactions.len() as u64 + 1,
        basis.total_ops + operations + proposer_transaction.operations().len() as u64,
        proposed_time,
        Timestamp::now(),
    )
}

/// The app state after applying transactions one after another on top of the committed app state.
///
/// Every transaction sees the effects of the transactions applied before it.
pub(crate) struct PendingAppState<'a, K: KVStore, A: App<K>> {
    block_store: &'a BlockStore<K>,
    app: &'a A,
    updates: AppStateUpdates,
}

impl<'a, K: KVStore, A: App<K>> PendingAppState<'a, K, A> {
    pub(crate) fn new(block_store: &'a BlockStore<K>, app: &'a A) -> Self {
        Self {
            block_store,
            app,
            updates: AppStateUpdates::new(),
        }
    }

    /// Validate `transaction` against the pending app state, and apply it if it is valid.
    pub(crate) fn validate_and_apply(
        &mut self,
        block: &Block,
        transaction: &Transaction,
    ) -> Result<(), AppError> {
        self.app.validate_transaction(ValidateTransactionRequest::new(
            transaction,
            AppStateView::new(self.block_store, Some(&self.updates)),
        ))?;
        self.apply(block, transaction)
    }

    /// Apply `transaction` as part of `block`. The pending app state is unchanged if this fails.
    pub(crate) fn apply(&mut self, block: &Block, transaction: &Transaction) -> Result<(), AppError> {
        let updates = self.app.apply_transaction(ApplyTransactionRequest::new(
            block,
            transaction,
            AppStateView::new(self.block_store, Some(&self.updates)),
        ))?;
        self.updates.extend(updates);
        Ok(())
    }

    pub(crate) fn into_updates(self) -> AppStateUpdates {
        self.updates
    }
}

#[derive(Debug)]
pub enum FinishError {
    /// The proposal does not extend the latest confirmed block.
    StaleBasis,
    /// A proposed transaction is not in the transaction pool.
    MissingTransaction { hash: CryptoHash },
    /// The app failed to apply a transaction.
    App { transaction: CryptoHash, source: AppError },
    BlockStore(BlockStoreError),
}

impl From<BlockStoreError> for FinishError {
    fn from(value: BlockStoreError) -> Self {
        FinishError::BlockStore(value)
    }
}
