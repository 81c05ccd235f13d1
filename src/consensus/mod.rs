/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Vote counting and the node's progress through rounds.
//!
//! A round is one attempt at agreeing on the block at the next height. It is identified by a
//! [`RoundIndex`](crate::ballot::basis::RoundIndex), and goes through three voting phases:
//! 1. INIT: the proposer of the round broadcasts a proposal.
//! 2. SIGN: every validator validates the proposal and votes on it.
//! 3. ACCEPT: every validator that saw the SIGN phase decided votes on the result.
//!
//! Once the ACCEPT phase is decided `Yes`, the proposed block is finalized, and every node moves to
//! ALLCONFIRM and then to round 0 of the next height. A phase that is not decided in time is voted
//! `Expired`, and the round is retried with the next proposer.
//!
//! The votes are counted by [`Isaac`](isaac::Isaac). The node's own position in the protocol is kept
//! by the [state manager](state_manager).

pub mod isaac;

pub mod proposer;

pub mod round_vote;

pub mod running_round;

pub mod state_manager;

pub mod threshold;
