/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A minimal runner for ordered lists of fallible steps.
//!
//! Each step either lets the next one run ([`Flow::Continue`]), ends the run without an error
//! ([`Flow::Stop`]), or fails. A stop is the normal outcome for duplicate and stale input.

use super::{ballot_checker::CheckerStop, CheckerError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop(CheckerStop),
}

pub(crate) type StepResult = Result<Flow, CheckerError>;

pub(crate) type Step<C> = fn(&mut C) -> StepResult;

/// Run `steps` on `context` in order, until one of them stops or fails.
///
/// Returns the stop reason if a step stopped the run, and `None` if every step continued.
pub(crate) fn run<C>(context: &mut C, steps: &[Step<C>]) -> Result<Option<CheckerStop>, CheckerError> {
    for step in steps {
        if let Flow::Stop(stop) = step(context)? {
            return Ok(Some(stop));
        }
    }
    Ok(None)
}
