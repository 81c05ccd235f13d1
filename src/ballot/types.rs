/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`Ballot`] type: a signed vote on a proposal, and the rules it must satisfy to be processed.
//!
//! A ballot is immutable once signed. Voting on a received ballot produces a new ballot (see
//! [`Ballot::revote`]) that carries the same proposal, signed by the voter.

use std::time::Duration;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{
    crypto_primitives::{hash, verify, Keypair},
    data_types::{Address, CryptoHash, NetworkID, SignatureBytes, Timestamp},
};

use super::{
    basis::VotingBasis,
    proposer_transaction::{ProposerTransaction, ProposerTransactionError},
    state::{BallotState, VotingHole},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotHeader {
    pub hash: CryptoHash,
    pub signature: SignatureBytes,
    pub proposer_signature: SignatureBytes,
}

/// The part of a ballot that is fixed by the proposer and shared by every vote on the proposal.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Proposed {
    pub confirmed: Timestamp,
    pub proposer: Address,
    pub voting_basis: VotingBasis,
    pub transactions: Vec<CryptoHash>,
    pub proposer_transaction: ProposerTransaction,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct BallotBody {
    pub confirmed: Timestamp,
    pub proposed: Proposed,
    pub source: Address,
    pub state: BallotState,
    pub vote: VotingHole,
    pub reason: Option<String>,
}

/// A signed vote of `body.source` on `body.proposed`, at phase `body.state`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(rename = "H")]
    pub header: BallotHeader,
    #[serde(rename = "B")]
    pub body: BallotBody,
}

impl Ballot {
    /// Create a new INIT proposal of `transactions` on `basis`, proposed and signed by `keypair`.
    ///
    /// A proposal without transactions has nothing to validate, so it is created with vote `Yes`.
    pub fn new_proposal(
        keypair: &Keypair,
        network_id: &NetworkID,
        basis: VotingBasis,
        transactions: Vec<CryptoHash>,
        proposer_transaction: ProposerTransaction,
    ) -> Ballot {
        let now = Timestamp::now();
        let vote = if transactions.is_empty() {
            VotingHole::Yes
        } else {
            VotingHole::NotYet
        };
        let proposed = Proposed {
            confirmed: now,
            proposer: keypair.address(),
            voting_basis: basis,
            transactions,
            proposer_transaction,
        };
        let proposer_signature = keypair.sign(network_id, &hash(&proposed));

        Ballot::sign(
            keypair,
            network_id,
            proposer_signature,
            BallotBody {
                confirmed: now,
                proposed,
                source: keypair.address(),
                state: BallotState::Init,
                vote,
                reason: None,
            },
        )
    }

    /// Create an `Expired` vote of `keypair` at phase `state` of the round `basis`, in which
    /// `proposer` was expected to propose.
    pub fn new_expired(
        keypair: &Keypair,
        network_id: &NetworkID,
        basis: VotingBasis,
        proposer: Address,
        state: BallotState,
    ) -> Ballot {
        let now = Timestamp::now();
        Ballot::sign(
            keypair,
            network_id,
            SignatureBytes::empty(),
            BallotBody {
                confirmed: now,
                proposed: Proposed {
                    confirmed: now,
                    proposer,
                    voting_basis: basis,
                    transactions: Vec::new(),
                    proposer_transaction: ProposerTransaction::default(),
                },
                source: keypair.address(),
                state,
                vote: VotingHole::Expired,
                reason: None,
            },
        )
    }

    /// Create the vote of `keypair` on the same proposal as this ballot, at phase `state`.
    pub fn revote(
        &self,
        keypair: &Keypair,
        network_id: &NetworkID,
        state: BallotState,
        vote: VotingHole,
        reason: Option<String>,
    ) -> Ballot {
        Ballot::sign(
            keypair,
            network_id,
            self.header.proposer_signature,
            BallotBody {
                confirmed: Timestamp::now(),
                proposed: self.body.proposed.clone(),
                source: keypair.address(),
                state,
                vote,
                reason,
            },
        )
    }

    fn sign(
        keypair: &Keypair,
        network_id: &NetworkID,
        proposer_signature: SignatureBytes,
        body: BallotBody,
    ) -> Ballot {
        let hash = hash(&body);
        Ballot {
            header: BallotHeader {
                hash,
                signature: keypair.sign(network_id, &hash),
                proposer_signature,
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

    pub fn state(&self) -> BallotState {
        self.body.state
    }

    pub fn vote(&self) -> VotingHole {
        self.body.vote
    }

    pub fn reason(&self) -> Option<&str> {
        self.body.reason.as_deref()
    }

    pub fn confirmed(&self) -> Timestamp {
        self.body.confirmed
    }

    pub fn proposer(&self) -> &Address {
        &self.body.proposed.proposer
    }

    pub fn basis(&self) -> &VotingBasis {
        &self.body.proposed.voting_basis
    }

    pub fn transactions(&self) -> &[CryptoHash] {
        &self.body.proposed.transactions
    }

    pub fn proposer_transaction(&self) -> &ProposerTransaction {
        &self.body.proposed.proposer_transaction
    }

    pub fn proposed_confirmed(&self) -> Timestamp {
        self.body.proposed.confirmed
    }

    /// Whether this ballot was cast by the proposer of the proposal it carries.
    pub fn is_from_proposer(&self) -> bool {
        self.body.source == self.body.proposed.proposer
    }

    /// Check the cryptographic correctness and the shape of this ballot.
    ///
    /// A ballot is well formed if:
    /// 1. `hash` is the hash of the body and `signature` is the source's signature over it.
    /// 2. Its `confirmed` time is within `time_skew` of the local time.
    /// 3. It proposes at most `transactions_limit` transactions.
    /// 4. Unless it is an `Expired` vote, `proposer_signature` is the proposer's signature over the
    ///    proposal, and the proposer transaction is well formed and sent by the proposer.
    /// 5. INIT ballots are cast by the proposer, and SIGN and ACCEPT ballots carry a decided vote.
    pub fn is_well_formed(
        &self,
        network_id: &NetworkID,
        transactions_limit: usize,
        time_skew: Duration,
    ) -> Result<(), BallotError> {
        if hash(&self.body) != self.header.hash {
            return Err(BallotError::HashMismatch);
        }
        if !verify(
            &self.body.source,
            network_id,
            &self.header.hash,
            &self.header.signature,
        ) {
            return Err(BallotError::InvalidSignature);
        }

        let now = Timestamp::now();
        if now.distance(&self.body.confirmed) > time_skew {
            return Err(BallotError::TimeSkew {
                confirmed: self.body.confirmed,
                now,
            });
        }

        let transactions = self.body.proposed.transactions.len();
        if transactions > transactions_limit {
            return Err(BallotError::TooManyTransactions {
                transactions,
                limit: transactions_limit,
            });
        }

        match self.body.state {
            BallotState::Init if !self.is_from_proposer() => {
                return Err(BallotError::InitNotFromProposer)
            }
            BallotState::Sign | BallotState::Accept if self.body.vote == VotingHole::NotYet => {
                return Err(BallotError::UndecidedVote)
            }
            BallotState::AllConfirm => return Err(BallotError::UnexpectedState),
            _ => (),
        }

        if self.body.vote != VotingHole::Expired {
            let proposed_hash = hash(&self.body.proposed);
            if !verify(
                &self.body.proposed.proposer,
                network_id,
                &proposed_hash,
                &self.header.proposer_signature,
            ) {
                return Err(BallotError::InvalidProposerSignature);
            }
            self.body
                .proposed
                .proposer_transaction
                .is_well_formed(network_id, &self.body.proposed.proposer)?;
        }

        Ok(())
    }

    /// Encode this ballot into its JSON wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Safety: every field serializes into a JSON value.
        serde_json::to_vec(self).unwrap()
    }

    /// Decode a ballot from its JSON wire format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Ballot, BallotError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[derive(Debug)]
pub enum BallotError {
    Decode(serde_json::Error),
    HashMismatch,
    InvalidSignature,
    InvalidProposerSignature,
    TimeSkew { confirmed: Timestamp, now: Timestamp },
    TooManyTransactions { transactions: usize, limit: usize },
    InitNotFromProposer,
    UndecidedVote,
    UnexpectedState,
    ProposerTransaction(ProposerTransactionError),
}

impl From<serde_json::Error> for BallotError {
    fn from(value: serde_json::Error) -> Self {
        BallotError::Decode(value)
    }
}

impl From<ProposerTransactionError> for BallotError {
    fn from(value: ProposerTransactionError) -> Self {
        BallotError::ProposerTransaction(value)
    }
}
