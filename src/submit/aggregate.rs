//! Thread-safe collection of per-record outcomes

use crate::error::{Error, Result};
use crate::types::{Operation, SubmissionOutcome, SubmissionSummary};
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Collects terminal outcomes from every worker of one batch
///
/// The only state shared between workers. Updates are appends under a mutex
/// that is never held across an await point.
#[derive(Debug)]
pub struct ResultAggregator {
    operation: Operation,
    total: usize,
    started_at: DateTime<Utc>,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    seen: Vec<bool>,
    successes: Vec<SubmissionOutcome>,
    failures: Vec<SubmissionOutcome>,
}

impl ResultAggregator {
    /// Create an aggregator expecting exactly `total` outcomes
    pub fn new(operation: Operation, total: usize) -> Self {
        Self {
            operation,
            total,
            started_at: Utc::now(),
            state: Mutex::new(State {
                seen: vec![false; total],
                successes: Vec::new(),
                failures: Vec::new(),
            }),
        }
    }

    /// Record one terminal outcome
    ///
    /// Fails if the index is out of range or already has an outcome.
    pub fn record(&self, outcome: SubmissionOutcome) -> Result<()> {
        let mut state = self.lock();
        let index = outcome.index;
        match state.seen.get_mut(index) {
            None => {
                return Err(Error::Internal(format!(
                    "outcome index {index} out of range for batch of {}",
                    self.total
                )));
            }
            Some(true) => {
                return Err(Error::Internal(format!(
                    "duplicate outcome for record {index}"
                )));
            }
            Some(seen) => *seen = true,
        }

        if outcome.succeeded {
            state.successes.push(outcome);
        } else {
            state.failures.push(outcome);
        }
        Ok(())
    }

    /// Whether record `index` already has an outcome
    pub fn has_outcome(&self, index: usize) -> bool {
        self.lock().seen.get(index).copied().unwrap_or(false)
    }

    /// Number of outcomes recorded so far
    pub fn recorded(&self) -> usize {
        let state = self.lock();
        state.successes.len() + state.failures.len()
    }

    /// Produce the batch summary
    ///
    /// Call only after every worker has finished. Fails if any outcome is
    /// missing, so nothing is silently dropped.
    pub fn finalize(self) -> Result<SubmissionSummary> {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        let succeeded = state.successes.len();
        let failed = state.failures.len();

        if succeeded + failed != self.total || state.seen.iter().any(|s| !s) {
            return Err(Error::Internal(format!(
                "batch accounting mismatch: {succeeded} succeeded + {failed} failed != {} total",
                self.total
            )));
        }

        Ok(SubmissionSummary {
            operation: self.operation,
            total: self.total,
            succeeded,
            failed,
            failures: state.failures,
            successes: state.successes,
            started_at: self.started_at,
            finished_at: Utc::now(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is append-only, so a panic mid-push cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
