/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Persistence of finalized blocks, transactions, and the app state.
//!
//! Users plug in a key-value store by implementing the traits in [`pluggables`]. The rest of the crate
//! accesses it through the [`BlockStore`](block_store::BlockStore).

pub mod block_store;

pub mod paths;

pub mod pluggables;
