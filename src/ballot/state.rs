/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Phases of a round ([`BallotState`]) and the values a vote can take ([`VotingHole`]).

use std::fmt::{self, Display, Formatter};

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

/// Phase of a round. Phases are totally ordered: `Init < Sign < Accept < AllConfirm`.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum BallotState {
    #[serde(rename = "INIT")]
    Init,
    #[serde(rename = "SIGN")]
    Sign,
    #[serde(rename = "ACCEPT")]
    Accept,
    #[serde(rename = "ALLCONFIRM")]
    AllConfirm,
}

impl BallotState {
    /// The phase that follows this one. `AllConfirm` ends the round, so the phase after it is the
    /// `Init` phase of the next height.
    pub fn next(&self) -> BallotState {
        match self {
            BallotState::Init => BallotState::Sign,
            BallotState::Sign => BallotState::Accept,
            BallotState::Accept => BallotState::AllConfirm,
            BallotState::AllConfirm => BallotState::Init,
        }
    }

    /// Whether votes in this phase are tallied in a [`RoundVote`](crate::consensus::round_vote::RoundVote).
    pub fn is_votable(&self) -> bool {
        matches!(self, BallotState::Sign | BallotState::Accept)
    }
}

impl Display for BallotState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BallotState::Init => "INIT",
            BallotState::Sign => "SIGN",
            BallotState::Accept => "ACCEPT",
            BallotState::AllConfirm => "ALLCONFIRM",
        })
    }
}

/// Value of a vote.
///
/// `NotYet` is the undecided sentinel. It is carried by INIT proposals whose transactions still need
/// to be validated, but never by a SIGN or ACCEPT ballot.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub enum VotingHole {
    #[serde(rename = "NOT-YET")]
    NotYet,
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl Display for VotingHole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VotingHole::NotYet => "NOT-YET",
            VotingHole::Yes => "YES",
            VotingHole::No => "NO",
            VotingHole::Expired => "EXPIRED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_ordered() {
        assert!(BallotState::Init < BallotState::Sign);
        assert!(BallotState::Sign < BallotState::Accept);
        assert!(BallotState::Accept < BallotState::AllConfirm);
        assert_eq!(BallotState::AllConfirm.next(), BallotState::Init);
        assert!(!BallotState::Init.is_votable());
        assert!(BallotState::Accept.is_votable());
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&BallotState::AllConfirm).unwrap(),
            "\"ALLCONFIRM\""
        );
        assert_eq!(
            serde_json::to_string(&VotingHole::NotYet).unwrap(),
            "\"NOT-YET\""
        );
        assert_eq!(
            serde_json::from_str::<VotingHole>("\"EXPIRED\"").unwrap(),
            VotingHole::Expired
        );
    }
}
