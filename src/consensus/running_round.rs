/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition of [`RunningRound`]: live bookkeeping of one round.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    ballot::{
        basis::VotingBasis,
        state::{BallotState, VotingHole},
        types::Ballot,
    },
    types::data_types::{Address, CryptoHash},
};

use super::{round_vote::RoundVote, threshold::ThresholdPolicy};

/// All votes cast in one round, grouped by the proposer they were cast on.
///
/// A round normally has a single proposer, but competing proposals can arrive from validators whose
/// view of the round differs. Each of them gets its own [`RoundVote`].
#[derive(Debug)]
pub struct RunningRound {
    basis: VotingBasis,
    proposer: Address,
    inner: RwLock<RunningRoundInner>,
}

#[derive(Debug, Default)]
struct RunningRoundInner {
    // First non-expired ballot seen per proposer.
    proposals: HashMap<Address, Ballot>,
    voted: HashMap<Address, RoundVote>,
}

impl RunningRound {
    /// Create an empty round on `basis`, in which `proposer` is expected to propose.
    pub fn new(basis: VotingBasis, proposer: Address) -> RunningRound {
        RunningRound {
            basis,
            proposer,
            inner: RwLock::new(RunningRoundInner::default()),
        }
    }

    pub fn basis(&self) -> &VotingBasis {
        &self.basis
    }

    /// The proposer this node expects for this round.
    pub fn proposer(&self) -> &Address {
        &self.proposer
    }

    /// Record `ballot`. Returns whether this is the first ballot seen for the ballot's proposer.
    pub fn vote(&self, ballot: &Ballot) -> bool {
        let proposer = *ballot.proposer();
        let mut inner = self.write();

        if ballot.vote() != VotingHole::Expired {
            inner
                .proposals
                .entry(proposer)
                .or_insert_with(|| ballot.clone());
        }

        let is_new = !inner.voted.contains_key(&proposer);
        inner
            .voted
            .entry(proposer)
            .or_insert_with(|| RoundVote::new(proposer))
            .vote(ballot);
        is_new
    }

    /// Whether `source` has voted at phase `state` on the proposal of `proposer`.
    pub fn is_voted_by(&self, proposer: &Address, source: &Address, state: BallotState) -> bool {
        self.read()
            .voted
            .get(proposer)
            .map(|round_vote| round_vote.is_voted_by(source, state))
            .unwrap_or(false)
    }

    /// Whether any ballot was recorded for `proposer`.
    pub fn has_proposer(&self, proposer: &Address) -> bool {
        self.read().voted.contains_key(proposer)
    }

    /// Try to decide phase `state` of the proposal of `proposer`.
    pub fn can_get_voting_result(
        &self,
        policy: &ThresholdPolicy,
        proposer: &Address,
        state: BallotState,
    ) -> (VotingHole, bool) {
        match self.read().voted.get(proposer) {
            Some(round_vote) => round_vote.can_get_voting_result(policy, state),
            None => (VotingHole::NotYet, false),
        }
    }

    /// A ballot carrying the proposal of `proposer`, if one was seen.
    pub fn proposal(&self, proposer: &Address) -> Option<Ballot> {
        self.read().proposals.get(proposer).cloned()
    }

    /// The transactions proposed by `proposer`, if a proposal from it was seen.
    pub fn transactions(&self, proposer: &Address) -> Option<Vec<CryptoHash>> {
        self.read()
            .proposals
            .get(proposer)
            .map(|ballot| ballot.transactions().to_vec())
    }

    /// Forget everything recorded for `proposer`.
    pub fn remove_proposer(&self, proposer: &Address) {
        let mut inner = self.write();
        inner.proposals.remove(proposer);
        inner.voted.remove(proposer);
    }

    pub fn is_empty(&self) -> bool {
        self.read().voted.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<RunningRoundInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<RunningRoundInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
