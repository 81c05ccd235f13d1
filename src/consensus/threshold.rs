/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definition of [`ThresholdPolicy`]: how many votes decide a phase.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::ballot::state::BallotState;

/// Converts the number of validators into the number of votes needed to decide a SIGN or ACCEPT
/// phase, and keeps track of how many validators are currently connected.
///
/// Both counts can be updated concurrently with reads.
#[derive(Debug)]
pub struct ThresholdPolicy {
    percentage: u64,
    validators: AtomicUsize,
    connected: AtomicUsize,
}

impl ThresholdPolicy {
    /// Create a policy requiring `percentage` percent of `validators` votes.
    ///
    /// # Panics
    ///
    /// If `percentage` is not in `1..=100` or `validators` is 0.
    pub fn new(percentage: u64, validators: usize) -> ThresholdPolicy {
        assert!(
            (1..=100).contains(&percentage),
            "threshold percentage must be in 1..=100, got {percentage}"
        );
        assert!(validators >= 1, "a network needs at least one validator");
        ThresholdPolicy {
            percentage,
            validators: AtomicUsize::new(validators),
            connected: AtomicUsize::new(validators),
        }
    }

    pub fn percentage(&self) -> u64 {
        self.percentage
    }

    /// Number of votes needed to decide `state`: `ceil(validators * percentage / 100)`.
    ///
    /// Only SIGN and ACCEPT are decided by votes. The threshold of every other state is 0.
    pub fn threshold(&self, state: BallotState) -> usize {
        if !state.is_votable() {
            return 0;
        }
        Self::ceil_percentage(self.validators(), self.percentage)
    }

    fn ceil_percentage(n: usize, percentage: u64) -> usize {
        ((n as u64 * percentage + 99) / 100) as usize
    }

    pub fn validators(&self) -> usize {
        self.validators.load(Ordering::SeqCst)
    }

    /// # Panics
    ///
    /// If `n` is 0.
    pub fn set_validators(&self, n: usize) {
        assert!(n >= 1, "a network needs at least one validator");
        self.validators.store(n, Ordering::SeqCst)
    }

    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    /// # Panics
    ///
    /// If `n` is 0. A node always counts itself as connected.
    pub fn set_connected(&self, n: usize) {
        assert!(n >= 1, "a node is always connected to itself");
        self.connected.store(n, Ordering::SeqCst)
    }
}
