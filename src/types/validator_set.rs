/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition for the [`ValidatorSet`] type.

use std::slice;

use super::data_types::Address;

/// Addresses of the fixed, known set of validators of a network.
///
/// The validator set keeps its addresses in ascending order and without duplicates. Every node that
/// is configured with the same addresses therefore iterates over them in the same order, which
/// proposer selection depends on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorSet {
    // Ascending order.
    validators: Vec<Address>,
}

impl ValidatorSet {
    pub fn new() -> ValidatorSet {
        Self {
            validators: Vec::new(),
        }
    }

    /// Insert `validator` into the set. Does nothing if it is already a member.
    pub fn put(&mut self, validator: Address) {
        if let Err(insert_pos) = self.validators.binary_search(&validator) {
            self.validators.insert(insert_pos, validator);
        }
    }

    pub fn remove(&mut self, validator: &Address) {
        if let Ok(pos) = self.validators.binary_search(validator) {
            self.validators.remove(pos);
        }
    }

    pub fn contains(&self, validator: &Address) -> bool {
        self.validators.binary_search(validator).is_ok()
    }

    /// Get the validator at `position` in ascending address order.
    pub fn get(&self, position: usize) -> Option<&Address> {
        self.validators.get(position)
    }

    /// Get an iterator through the validators in ascending address order.
    pub fn validators(&self) -> slice::Iter<Address> {
        self.validators.iter()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl FromIterator<Address> for ValidatorSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut validator_set = ValidatorSet::new();
        for validator in iter {
            validator_set.put(validator);
        }
        validator_set
    }
}
