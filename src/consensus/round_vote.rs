/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition of [`RoundVote`]: one proposer's tally of SIGN and ACCEPT votes in a round.

use std::collections::HashMap;

use crate::{
    ballot::{
        state::{BallotState, VotingHole},
        types::Ballot,
    },
    types::data_types::Address,
};

use super::threshold::ThresholdPolicy;

/// Votes cast on the proposal of `proposer` in one round.
///
/// Votes are last-write-wins: a validator that votes twice in the same phase replaces its earlier
/// vote. The proposer's own ballots carry the proposal rather than a vote on it, so they are never
/// recorded.
#[derive(Clone, Debug)]
pub struct RoundVote {
    proposer: Address,
    sign: HashMap<Address, VotingHole>,
    accept: HashMap<Address, VotingHole>,
}

impl RoundVote {
    pub fn new(proposer: Address) -> RoundVote {
        RoundVote {
            proposer,
            sign: HashMap::new(),
            accept: HashMap::new(),
        }
    }

    pub fn proposer(&self) -> &Address {
        &self.proposer
    }

    /// Record the vote carried by `ballot`. Ballots from the proposer, and ballots in a phase that is
    /// not tallied, are ignored.
    pub fn vote(&mut self, ballot: &Ballot) {
        if ballot.source() == &self.proposer {
            return;
        }
        if let Some(votes) = self.votes_mut(ballot.state()) {
            votes.insert(*ballot.source(), ballot.vote());
        }
    }

    /// Whether `source` has a recorded vote at phase `state`.
    pub fn is_voted_by(&self, source: &Address, state: BallotState) -> bool {
        self.votes(state)
            .map(|votes| votes.contains_key(source))
            .unwrap_or(false)
    }

    /// The recorded votes at phase `state`, or `None` if `state` is not tallied.
    pub fn votes(&self, state: BallotState) -> Option<&HashMap<Address, VotingHole>> {
        match state {
            BallotState::Sign => Some(&self.sign),
            BallotState::Accept => Some(&self.accept),
            _ => None,
        }
    }

    fn votes_mut(&mut self, state: BallotState) -> Option<&mut HashMap<Address, VotingHole>> {
        match state {
            BallotState::Sign => Some(&mut self.sign),
            BallotState::Accept => Some(&mut self.accept),
            _ => None,
        }
    }

    /// Try to decide phase `state` from the votes recorded so far.
    ///
    /// Returns `(vote, true)` once the phase is decided and `(VotingHole::NotYet, false)` otherwise.
    /// A phase is decided when:
    /// - `threshold` validators voted `Yes`, or
    /// - enough validators voted `No`: `threshold + 1` at SIGN, `threshold` at ACCEPT, or
    /// - neither `Yes` nor `No` can reach `threshold` anymore even if every validator that has not
    ///   voted yet votes the same way. The phase is then decided `Expired`.
    pub fn can_get_voting_result(
        &self,
        policy: &ThresholdPolicy,
        state: BallotState,
    ) -> (VotingHole, bool) {
        let threshold = policy.threshold(state);
        let votes = match self.votes(state) {
            Some(votes) => votes,
            None => return (VotingHole::NotYet, false),
        };
        if threshold < 1 || votes.len() < threshold {
            return (VotingHole::NotYet, false);
        }

        let (mut yes, mut no, mut expired) = (0, 0, 0);
        for vote in votes.values() {
            match vote {
                VotingHole::Yes => yes += 1,
                VotingHole::No => no += 1,
                VotingHole::Expired => expired += 1,
                VotingHole::NotYet => (),
            }
        }

        let no_threshold = match state {
            BallotState::Sign => threshold + 1,
            _ => threshold,
        };
        if yes >= threshold {
            return (VotingHole::Yes, true);
        }
        if no >= no_threshold {
            return (VotingHole::No, true);
        }

        let remaining = policy.validators().saturating_sub(yes + no + expired);
        if remaining + yes < threshold && remaining + no < threshold {
            return (VotingHole::Expired, true);
        }

        (VotingHole::NotYet, false)
    }
}
