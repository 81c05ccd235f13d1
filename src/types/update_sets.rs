/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that store updates to the App-mutable state.

use std::collections::{hash_map, hash_set, HashMap, HashSet};

/// Set of key-value updates to the app state, applied atomically when a block is finalized.
///
/// # Uniqueness of keys between `inserts` and `deletes`
///
/// A key is never scheduled for both insertion and deletion: scheduling one cancels the other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppStateUpdates {
    inserts: HashMap<Vec<u8>, Vec<u8>>,
    deletes: HashSet<Vec<u8>>,
}

impl AppStateUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule the insertion of `key`-`value`. Cancels a scheduled deletion of `key`.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.deletes.remove(&key);
        self.inserts.insert(key, value);
    }

    /// Schedule the deletion of `key`. Cancels a scheduled insertion of `key`.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.inserts.remove(&key);
        self.deletes.insert(key);
    }

    pub fn get_insert(&self, key: &[u8]) -> Option<&Vec<u8>> {
        self.inserts.get(key)
    }

    pub fn contains_delete(&self, key: &[u8]) -> bool {
        self.deletes.contains(key)
    }

    pub fn inserts(&self) -> hash_map::Iter<Vec<u8>, Vec<u8>> {
        self.inserts.iter()
    }

    pub fn deletes(&self) -> hash_set::Iter<Vec<u8>> {
        self.deletes.iter()
    }

    /// Apply `later` on top of these updates, so that the updates in `later` take precedence.
    pub fn extend(&mut self, later: AppStateUpdates) {
        for key in later.deletes {
            self.delete(key);
        }
        for (key, value) in later.inserts {
            self.insert(key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }
}
