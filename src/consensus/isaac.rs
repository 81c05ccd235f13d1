/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The consensus controller, [`Isaac`].
//!
//! `Isaac` is shared between the thread that processes inbound ballots and the state manager thread.
//! The map of running rounds and the latest confirmed block are each guarded by a reader/writer lock,
//! and every [`RunningRound`] guards its own tallies, so computing a result never blocks another
//! computation.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    ballot::{
        basis::{RoundIndex, VotingBasis},
        state::{BallotState, VotingHole},
        types::Ballot,
    },
    types::{
        block::Block,
        data_types::{Address, BlockHeight, RoundNumber},
        validator_set::ValidatorSet,
    },
};

use super::{proposer::ProposerSelector, running_round::RunningRound, threshold::ThresholdPolicy};

pub struct Isaac {
    validators: ValidatorSet,
    policy: ThresholdPolicy,
    selector: Box<dyn ProposerSelector>,
    running_rounds: RwLock<BTreeMap<RoundIndex, Arc<RunningRound>>>,
    latest_confirmed_block: RwLock<Block>,
    latest_round: RwLock<Option<VotingBasis>>,
}

impl Isaac {
    pub fn new(
        validators: ValidatorSet,
        policy: ThresholdPolicy,
        selector: Box<dyn ProposerSelector>,
        latest_confirmed_block: Block,
    ) -> Isaac {
        Isaac {
            validators,
            policy,
            selector,
            running_rounds: RwLock::new(BTreeMap::new()),
            latest_confirmed_block: RwLock::new(latest_confirmed_block),
            latest_round: RwLock::new(None),
        }
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.validators.contains(address)
    }

    /// The proposer of round `round` at height `height`.
    pub fn select_proposer(&self, height: BlockHeight, round: RoundNumber) -> Option<Address> {
        self.selector.select(&self.validators, height, round)
    }

    pub fn latest_confirmed_block(&self) -> Block {
        self.latest_confirmed_block
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_latest_confirmed_block(&self, block: Block) {
        *self
            .latest_confirmed_block
            .write()
            .unwrap_or_else(PoisonError::into_inner) = block;
    }

    /// The basis of the last round this node closed with a decisive result.
    pub fn latest_round(&self) -> Option<VotingBasis> {
        *self.latest_round.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn running_round(&self, index: &RoundIndex) -> Option<Arc<RunningRound>> {
        self.rounds().get(index).cloned()
    }

    /// Indices of every running round, in ascending order.
    pub fn running_round_indices(&self) -> Vec<RoundIndex> {
        self.rounds().keys().copied().collect()
    }

    /// Record `ballot` in the running round of its basis, creating the round if this is the first
    /// ballot seen for it.
    ///
    /// Returns whether this is the first ballot seen for the ballot's proposer in the round.
    pub fn vote(&self, ballot: &Ballot) -> Result<bool, IsaacError> {
        let index = ballot.basis().index();
        if let Some(round) = self.running_round(&index) {
            return Ok(round.vote(ballot));
        }

        // The expected proposer is computed locally. A ballot that claims a different proposer still
        // creates the round, and is dealt with by `has_same_proposer`.
        let proposer = self
            .select_proposer(index.height, index.round)
            .ok_or(IsaacError::NoProposer { index })?;
        let round = self
            .rounds_mut()
            .entry(index)
            .or_insert_with(|| Arc::new(RunningRound::new(*ballot.basis(), proposer)))
            .clone();
        Ok(round.vote(ballot))
    }

    /// Whether the source of `ballot` has already voted in the same round, on the same proposer, at
    /// the same phase.
    pub fn is_voted(&self, ballot: &Ballot) -> bool {
        self.is_voted_by(ballot.basis(), ballot.proposer(), ballot.source(), ballot.state())
    }

    pub fn is_voted_by(
        &self,
        basis: &VotingBasis,
        proposer: &Address,
        source: &Address,
        state: BallotState,
    ) -> bool {
        self.running_round(&basis.index())
            .map(|round| round.is_voted_by(proposer, source, state))
            .unwrap_or(false)
    }

    /// Try to decide the phase of `ballot` in its round, for its proposer.
    pub fn can_get_voting_result(&self, ballot: &Ballot) -> (VotingHole, bool) {
        match self.running_round(&ballot.basis().index()) {
            Some(round) => round.can_get_voting_result(&self.policy, ballot.proposer(), ballot.state()),
            None => (VotingHole::NotYet, false),
        }
    }

    /// A ballot carrying the proposal of `proposer` in the round on `basis`, if one was seen.
    pub fn proposal(&self, basis: &VotingBasis, proposer: &Address) -> Option<Ballot> {
        self.running_round(&basis.index())
            .and_then(|round| round.proposal(proposer))
    }

    /// Whether `ballot` claims the proposer this node expects for its round.
    pub fn has_same_proposer(&self, ballot: &Ballot) -> bool {
        let index = ballot.basis().index();
        match self.running_round(&index) {
            Some(round) => round.proposer() == ballot.proposer(),
            None => self.select_proposer(index.height, index.round).as_ref() == Some(ballot.proposer()),
        }
    }

    /// Whether a ballot on `basis` may still be processed.
    ///
    /// A basis is rejected if it is behind the latest confirmed block, if it is at the same height
    /// but extends a different block, or if its round at the height of the latest closed round is not
    /// strictly greater than that round.
    pub fn is_available_round(&self, basis: &VotingBasis) -> bool {
        {
            let latest = self
                .latest_confirmed_block
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if basis.height < latest.height {
                return false;
            }
            if basis.height == latest.height && basis.block_hash != latest.hash {
                return false;
            }
        }

        match self.latest_round() {
            Some(latest_round) => {
                !(basis.height == latest_round.height && basis.round <= latest_round.round)
            }
            None => true,
        }
    }

    /// Close the round on `basis` after its ACCEPT phase was decided `vote` for `proposer`.
    ///
    /// On `No`, only the proposal of `proposer` is forgotten, since another proposal may still
    /// succeed in the same round. On any other result, the round and every round at a lower or equal
    /// height are removed, and `basis` becomes the latest closed round.
    pub fn close_consensus(
        &self,
        proposer: &Address,
        basis: &VotingBasis,
        vote: VotingHole,
    ) -> Result<(), IsaacError> {
        match vote {
            VotingHole::NotYet => Err(IsaacError::UndecidedClose {
                index: basis.index(),
            }),
            VotingHole::No => {
                let index = basis.index();
                let mut rounds = self.rounds_mut();
                if let Some(round) = rounds.get(&index) {
                    round.remove_proposer(proposer);
                    if round.is_empty() {
                        rounds.remove(&index);
                    }
                }
                Ok(())
            }
            VotingHole::Yes | VotingHole::Expired => {
                self.rounds_mut()
                    .retain(|index, _| index.height > basis.height);
                *self
                    .latest_round
                    .write()
                    .unwrap_or_else(PoisonError::into_inner) = Some(*basis);
                Ok(())
            }
        }
    }

    /// Close the round on `basis` without a result. The round is removed and becomes the latest
    /// closed round, so later ballots of the round are not processed. Other rounds are kept.
    pub fn abandon_round(&self, basis: &VotingBasis) {
        self.rounds_mut().remove(&basis.index());
        *self
            .latest_round
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(*basis);
    }

    fn rounds(&self) -> RwLockReadGuard<BTreeMap<RoundIndex, Arc<RunningRound>>> {
        self.running_rounds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn rounds_mut(&self) -> RwLockWriteGuard<BTreeMap<RoundIndex, Arc<RunningRound>>> {
        self.running_rounds
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub enum IsaacError {
    NoProposer { index: RoundIndex },
    UndecidedClose { index: RoundIndex },
}
