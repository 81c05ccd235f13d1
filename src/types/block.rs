/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type and its associated methods.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use super::crypto_primitives::{CryptoHasher, Digest};
use super::data_types::*;

/// A finalized block.
///
/// A block stores the hashes of the transactions it contains. The transactions themselves, including
/// the proposer transaction, are stored separately by the [`BlockStore`](crate::storage::block_store::BlockStore).
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Block {
    pub hash: CryptoHash,
    pub height: BlockHeight,
    pub round: RoundNumber,
    pub prev_block_hash: CryptoHash,
    pub proposer: Address,
    pub transactions: Vec<CryptoHash>,
    pub proposer_transaction: CryptoHash,
    /// Number of transactions in this block and all its ancestors, proposer transactions included.
    pub total_txs: u64,
    /// Number of operations in this block and all its ancestors, proposer transactions included.
    pub total_ops: u64,
    /// When the proposer created the proposal this block was built from.
    pub proposed_time: Timestamp,
    /// When this node finalized this block. Differs between nodes, so it is not hashed.
    pub confirmed: Timestamp,
}

impl Block {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        height: BlockHeight,
        round: RoundNumber,
        prev_block_hash: CryptoHash,
        proposer: Address,
        transactions: Vec<CryptoHash>,
        proposer_transaction: CryptoHash,
        total_txs: u64,
        total_ops: u64,
        proposed_time: Timestamp,
        confirmed: Timestamp,
    ) -> Block {
        let mut block = Block {
            hash: CryptoHash::zero(),
            height,
            round,
            prev_block_hash,
            proposer,
            transactions,
            proposer_transaction,
            total_txs,
            total_ops,
            proposed_time,
            confirmed,
        };
        block.hash = block.compute_hash();
        block
    }

    /// The block at height 0. Every network starts from the same genesis block.
    pub fn genesis() -> Block {
        Block::new(
            BlockHeight::new(0),
            RoundNumber::init(),
            CryptoHash::zero(),
            Address::default(),
            Vec::new(),
            CryptoHash::zero(),
            0,
            0,
            Timestamp::new(0),
            Timestamp::new(0),
        )
    }

    /// Hash of every field of this block except `hash` and `confirmed`.
    pub fn compute_hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(&self.height.try_to_vec().unwrap());
        hasher.update(&self.round.try_to_vec().unwrap());
        hasher.update(&self.prev_block_hash.try_to_vec().unwrap());
        hasher.update(&self.proposer.try_to_vec().unwrap());
        hasher.update(&self.transactions.try_to_vec().unwrap());
        hasher.update(&self.proposer_transaction.try_to_vec().unwrap());
        hasher.update(&self.total_txs.try_to_vec().unwrap());
        hasher.update(&self.total_ops.try_to_vec().unwrap());
        hasher.update(&self.proposed_time.try_to_vec().unwrap());
        CryptoHash::new(hasher.finalize().into())
    }

    /// Checks that `hash` is the hash of the other fields.
    pub fn is_correct(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_deterministic() {
        let genesis = Block::genesis();
        assert_eq!(genesis, Block::genesis());
        assert_eq!(genesis.height, BlockHeight::new(0));
        assert!(genesis.is_correct());
    }

    #[test]
    fn modified_block_is_not_correct() {
        let mut block = Block::genesis();
        block.total_txs += 1;
        assert!(!block.is_correct());
    }
}
