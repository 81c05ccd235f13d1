/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ballot data model: what validators exchange to agree on the next block.
//!
//! A round starts with the proposer broadcasting an INIT [`Ballot`](types::Ballot) that carries a
//! [`Proposed`](types::Proposed) set of transactions and a
//! [`ProposerTransaction`](proposer_transaction::ProposerTransaction). Every other validator then
//! re-signs the same proposal with its own vote, first at the SIGN phase and then at the ACCEPT phase.

pub mod basis;

pub mod proposer_transaction;

pub mod state;

pub mod types;
