/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Identity of an agreement attempt: [`VotingBasis`] and the key derived from it, [`RoundIndex`].

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{
    block::Block,
    data_types::{BlockHeight, CryptoHash, RoundNumber},
};

/// The round a ballot votes in, together with the latest confirmed block the round extends.
///
/// `height`, `block_hash`, `total_txs` and `total_ops` describe the latest confirmed block. The block
/// that the round decides on will have height `height + 1`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct VotingBasis {
    pub round: RoundNumber,
    pub height: BlockHeight,
    pub block_hash: CryptoHash,
    pub total_txs: u64,
    pub total_ops: u64,
}

impl VotingBasis {
    /// The basis of round `round` on top of `block`.
    pub fn from_block(block: &Block, round: RoundNumber) -> VotingBasis {
        VotingBasis {
            round,
            height: block.height,
            block_hash: block.hash,
            total_txs: block.total_txs,
            total_ops: block.total_ops,
        }
    }

    pub fn index(&self) -> RoundIndex {
        RoundIndex {
            height: self.height,
            round: self.round,
        }
    }

    /// Whether `block` is the block this basis extends.
    pub fn extends(&self, block: &Block) -> bool {
        self.height == block.height
            && self.block_hash == block.hash
            && self.total_txs == block.total_txs
            && self.total_ops == block.total_ops
    }
}

/// Key of a [`RunningRound`](crate::consensus::running_round::RunningRound). Two ballots are in the
/// same round iff their indices are equal.
///
/// Indices are ordered by height, then by round. Displays as `"<height>-<round>"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoundIndex {
    pub height: BlockHeight,
    pub round: RoundNumber,
}

impl Display for RoundIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.height, self.round)
    }
}
