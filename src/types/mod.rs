/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types and traits that are used across multiple components of isaac_rs.
//!
//! Types specific to the ballot exchange live in [`crate::ballot`].

pub mod data_types;

pub mod crypto_primitives;

pub mod validator_set;

pub mod block;

pub mod transaction;

pub mod update_sets;
