/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the [`Transaction`] and [`Operation`] types.
//!
//! The consensus core only needs transactions to be hashable, signable, and countable. What their
//! operations *mean* for the ledger is decided by the [`App`](crate::app::App).

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use super::{
    crypto_primitives::{hash, verify, Keypair},
    data_types::{Address, Amount, BlockHeight, CryptoHash, NetworkID, SignatureBytes},
};

/// A single ledger effect carried by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "kebab-case")]
pub enum Operation {
    CreateAccount {
        target: Address,
        amount: Amount,
    },
    Payment {
        target: Address,
        amount: Amount,
    },
    /// Collect the fees of the `txs` transactions of the block at `height` into `target`.
    CollectTxFee {
        target: Address,
        amount: Amount,
        txs: u64,
        height: BlockHeight,
    },
    /// Mint `amount` into `target` for the block at `height`.
    Inflation {
        target: Address,
        amount: Amount,
        height: BlockHeight,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TransactionHeader {
    pub hash: CryptoHash,
    pub signature: SignatureBytes,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TransactionBody {
    pub source: Address,
    pub fee: Amount,
    pub sequence_id: u64,
    pub operations: Vec<Operation>,
}

/// A signed transaction. `header.hash` is the hash of `body`, and `header.signature` is the
/// signature of `body.source` over `network_id ‖ header.hash`.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "H")]
    pub header: TransactionHeader,
    #[serde(rename = "B")]
    pub body: TransactionBody,
}

impl Transaction {
    /// Create a transaction with `body`, signed by `keypair` for `network_id`.
    ///
    /// The caller is responsible for `body.source` being the address of `keypair`.
    pub fn new(keypair: &Keypair, network_id: &NetworkID, body: TransactionBody) -> Transaction {
        let hash = hash(&body);
        Transaction {
            header: TransactionHeader {
                hash,
                signature: keypair.sign(network_id, &hash),
            },
            body,
        }
    }

    pub fn hash(&self) -> CryptoHash {
        self.header.hash
    }

    pub fn source(&self) -> &Address {
        &self.body.source
    }

    pub fn fee(&self) -> Amount {
        self.body.fee
    }

    pub fn operations(&self) -> &[Operation] {
        &self.body.operations
    }

    /// Check that the hash and signature of this transaction are correct, and that it carries at
    /// least one operation.
    pub fn is_well_formed(&self, network_id: &NetworkID) -> Result<(), TransactionError> {
        if self.body.operations.is_empty() {
            return Err(TransactionError::NoOperations);
        }
        if hash(&self.body) != self.header.hash {
            return Err(TransactionError::HashMismatch);
        }
        if !verify(
            &self.body.source,
            network_id,
            &self.header.hash,
            &self.header.signature,
        ) {
            return Err(TransactionError::InvalidSignature);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    NoOperations,
    HashMismatch,
    InvalidSignature,
}
