/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each stored variable lives in the user-provided key-value store.
//!
//! Every value is stored **Borsh-serialized**.
//!
//! ## Single values
//!
//! Single values (the hash of the latest block) are stored at a one-byte constant key.
//!
//! ## Mappings
//!
//! Mappings of the form "`A` -> `B`" (e.g., blocks) are stored at keys formed by concatenating a
//! one-byte prefix sharing the variable's name with the bytes of the `A` value. Block heights are
//! encoded big-endian so that keys sort by height.

// Mappings
pub const BLOCKS: [u8; 1] = [0];
pub const BLOCK_AT_HEIGHT: [u8; 1] = [1];
pub const TRANSACTIONS: [u8; 1] = [2];
pub const APP_STATE: [u8; 1] = [3];

// Single values
pub const LATEST_BLOCK: [u8; 1] = [4];

/// Concatenate two byteslices into one vector.
pub fn combine(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
