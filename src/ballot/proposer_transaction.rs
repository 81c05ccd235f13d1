/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The transaction a proposer bundles into its proposal to collect the fees of the proposed
//! transactions and to mint the inflation of the new block.

use serde::{Deserialize, Serialize};
use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    crypto_primitives::Keypair,
    data_types::{Address, Amount, BlockHeight, CryptoHash, NetworkID, SignatureBytes},
    transaction::{Operation, Transaction, TransactionBody, TransactionError, TransactionHeader},
};

use super::basis::VotingBasis;

/// A [`Transaction`] with zero fee and exactly two operations, in order: [`Operation::CollectTxFee`]
/// then [`Operation::Inflation`].
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposerTransaction(Transaction);

impl ProposerTransaction {
    /// Create the proposer transaction for the block built on `basis`, signed by `keypair`.
    ///
    /// `fees` is the sum of the fees of the `txs` proposed transactions.
    pub fn new(
        keypair: &Keypair,
        network_id: &NetworkID,
        common_account: Address,
        basis: &VotingBasis,
        fees: Amount,
        txs: u64,
        inflation: Amount,
    ) -> ProposerTransaction {
        let height = basis.height + 1;
        let body = TransactionBody {
            source: keypair.address(),
            fee: Amount::zero(),
            sequence_id: height.int(),
            operations: vec![
                Operation::CollectTxFee {
                    target: common_account,
                    amount: fees,
                    txs,
                    height,
                },
                Operation::Inflation {
                    target: common_account,
                    amount: inflation,
                    height,
                },
            ],
        };
        ProposerTransaction(Transaction::new(keypair, network_id, body))
    }

    pub fn hash(&self) -> CryptoHash {
        self.0.hash()
    }

    pub fn source(&self) -> &Address {
        self.0.source()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.0
    }

    /// Get `(target, amount, txs, height)` of the fee-collection operation.
    pub fn collect_tx_fee(&self) -> Option<(&Address, Amount, u64, BlockHeight)> {
        match self.0.operations().first() {
            Some(Operation::CollectTxFee {
                target,
                amount,
                txs,
                height,
            }) => Some((target, *amount, *txs, *height)),
            _ => None,
        }
    }

    /// Get `(target, amount, height)` of the inflation operation.
    pub fn inflation(&self) -> Option<(&Address, Amount, BlockHeight)> {
        match self.0.operations().get(1) {
            Some(Operation::Inflation {
                target,
                amount,
                height,
            }) => Some((target, *amount, *height)),
            _ => None,
        }
    }

    /// Check that this transaction is correctly signed by `proposer` and has the shape of a proposer
    /// transaction.
    pub fn is_well_formed(
        &self,
        network_id: &NetworkID,
        proposer: &Address,
    ) -> Result<(), ProposerTransactionError> {
        if self.0.source() != proposer {
            return Err(ProposerTransactionError::NotFromProposer);
        }
        if self.0.fee() != Amount::zero() {
            return Err(ProposerTransactionError::NonZeroFee);
        }
        if self.0.operations().len() != 2
            || self.collect_tx_fee().is_none()
            || self.inflation().is_none()
        {
            return Err(ProposerTransactionError::UnexpectedOperations);
        }
        self.0.is_well_formed(network_id)?;
        Ok(())
    }
}

/// The placeholder carried by EXPIRED ballots, which propose nothing.
impl Default for ProposerTransaction {
    fn default() -> Self {
        ProposerTransaction(Transaction {
            header: TransactionHeader {
                hash: CryptoHash::zero(),
                signature: SignatureBytes::empty(),
            },
            body: TransactionBody {
                source: Address::default(),
                fee: Amount::zero(),
                sequence_id: 0,
                operations: Vec::new(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposerTransactionError {
    NotFromProposer,
    NonZeroFee,
    UnexpectedOperations,
    Transaction(TransactionError),
}

impl From<TransactionError> for ProposerTransactionError {
    fn from(value: TransactionError) -> Self {
        ProposerTransactionError::Transaction(value)
    }
}
