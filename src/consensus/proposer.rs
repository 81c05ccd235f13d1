/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Proposer selection.
//!
//! Every node computes the proposer of a round on its own, without communication. Two honest nodes
//! with the same validator set must therefore select the same proposer for the same height and round.

use crate::types::{
    data_types::{Address, BlockHeight, RoundNumber},
    validator_set::ValidatorSet,
};

/// Deterministic choice of the validator that proposes in a given round.
pub trait ProposerSelector: Send + Sync {
    /// Select the proposer of round `round` at height `height`. Returns `None` only if `validators`
    /// is empty.
    fn select(
        &self,
        validators: &ValidatorSet,
        height: BlockHeight,
        round: RoundNumber,
    ) -> Option<Address>;
}

/// Rotates through the validators in ascending address order: the proposer of `(height, round)` is
/// the validator at position `(height + round) mod len(validators)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialSelector;

impl ProposerSelector for SequentialSelector {
    fn select(
        &self,
        validators: &ValidatorSet,
        height: BlockHeight,
        round: RoundNumber,
    ) -> Option<Address> {
        if validators.is_empty() {
            return None;
        }
        let position = height
            .int()
            .wrapping_add(round.int())
            .checked_rem(validators.len() as u64)?;
        validators.get(position as usize).copied()
    }
}

/// Always selects the same validator. Useful for networks with a designated proposer.
#[derive(Clone, Copy, Debug)]
pub struct FixedSelector(pub Address);

impl ProposerSelector for FixedSelector {
    fn select(&self, _: &ValidatorSet, _: BlockHeight, _: RoundNumber) -> Option<Address> {
        Some(self.0)
    }
}
