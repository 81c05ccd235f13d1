/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A validator node for the ISAAC consensus protocol.
//!
//! Validators agree on each block in rounds of federated voting. A round has a proposer, which
//! broadcasts a proposal of transactions, and every validator votes on it at the SIGN and ACCEPT
//! phases. A phase is decided once the votes of a quorum of validators agree.
//!
//! To run a validator, implement [`App`](app::App), [`Network`](networking::network::Network), and
//! [`KVStore`](storage::pluggables::KVStore), then build a [`NodeSpec`](node::NodeSpec) and
//! [`start`](node::NodeSpec::start) it.

pub mod types;

pub mod ballot;

pub mod consensus;

pub mod checker;

pub mod storage;

pub mod networking;

pub mod transaction_pool;

pub mod app;

pub mod events;

pub(crate) mod event_bus;

pub mod logging;

pub mod node;

#[cfg(test)]
mod test_utils;
