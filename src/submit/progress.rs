//! Progress callback trait for interface-agnostic updates
//!
//! This trait allows different interfaces (CLI, web server, etc.) to receive
//! progress updates while a batch runs.

use crate::error::Error;
use crate::types::{FailureCause, Record, SubmissionOutcome};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Batch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking records before submission
    Validating,
    /// Records are being sent to the remote service
    Dispatching,
    /// Cancellation requested; draining in-flight work
    Cancelling,
    /// Every record has an outcome
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validating => "Validating",
            Self::Dispatching => "Submitting",
            Self::Cancelling => "Cancelling",
            Self::Complete => "Done",
        };
        write!(f, "{s}")
    }
}

/// Progress callback trait
///
/// Called concurrently from engine workers, hence `Send + Sync`.
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// Called when entering a new phase
    async fn on_phase(&self, phase: Phase);

    /// Called once before dispatch with the number of records to submit
    async fn on_batch_started(&self, total: usize);

    /// Called after every failed attempt; `retry_in` is set when another
    /// attempt follows
    async fn on_attempt_failed(
        &self,
        record: &Record,
        attempt: u32,
        cause: &FailureCause,
        retry_in: Option<Duration>,
    );

    /// Called exactly once per record when it reaches a terminal outcome
    async fn on_outcome(&self, outcome: &SubmissionOutcome);

    /// Called when an error occurs (non-fatal)
    async fn on_error(&self, error: &Error);

    /// Called with a general status message
    async fn on_message(&self, message: &str);
}

/// No-op progress callback for testing or when progress isn't needed
pub struct NoopProgress;

#[async_trait]
impl ProgressCallback for NoopProgress {
    async fn on_phase(&self, _phase: Phase) {}
    async fn on_batch_started(&self, _total: usize) {}
    async fn on_attempt_failed(
        &self,
        _record: &Record,
        _attempt: u32,
        _cause: &FailureCause,
        _retry_in: Option<Duration>,
    ) {
    }
    async fn on_outcome(&self, _outcome: &SubmissionOutcome) {}
    async fn on_error(&self, _error: &Error) {}
    async fn on_message(&self, _message: &str) {}
}
