//! Concurrent batch submission
//!
//! A fixed pool of workers drains a shared queue of records. Each worker runs
//! one record's attempt loop to completion before taking the next, so at most
//! `max_concurrent_tasks` remote calls are ever outstanding.
//!
//! ```text
//! queue ──► worker 0 ──┐
//!       ──► worker 1 ──┼──► ResultAggregator ──► SubmissionSummary
//!       ──► worker N ──┘         │
//!                                └──► ProgressCallback::on_outcome
//! ```

use crate::error::{Error, Result};
use crate::remote::{RemoteClient, RemoteResult};
use crate::submit::aggregate::ResultAggregator;
use crate::submit::progress::{NoopProgress, Phase, ProgressCallback};
use crate::submit::retry::RetryPolicy;
use crate::types::{
    AttemptOutcome, FailureCause, FailureKind, Operation, Record, SubmissionOutcome,
    SubmissionSummary,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Engine settings for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// What to do with each record
    pub operation: Operation,
    /// Upper bound on in-flight remote calls; values below 1 are treated as 1
    pub max_concurrent_tasks: usize,
    /// Per-record retry policy
    pub retry: RetryPolicy,
    /// Cancel the batch after this long
    pub batch_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation: Operation::Create,
            max_concurrent_tasks: 5,
            retry: RetryPolicy::default(),
            batch_timeout: None,
        }
    }
}

/// Drives a batch of records through a [`RemoteClient`]
pub struct SubmissionEngine {
    client: Arc<dyn RemoteClient>,
    config: EngineConfig,
    progress: Arc<dyn ProgressCallback>,
    cancel: CancellationToken,
}

impl SubmissionEngine {
    /// Create an engine that owns `client` for its lifetime
    pub fn new(client: Arc<dyn RemoteClient>, config: EngineConfig) -> Self {
        Self {
            client,
            config,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Report outcomes and attempt failures to `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Cancel runs when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that aborts any run of this engine when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Submit every record and wait until each has a terminal outcome
    ///
    /// Returns only after all workers have been joined, including when the
    /// batch is cancelled; records that never started are reported as
    /// cancelled failures with zero attempts.
    pub async fn run(&self, records: &[Record]) -> Result<SubmissionSummary> {
        if records.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let total = records.len();
        let workers = self.config.max_concurrent_tasks.clamp(1, total);
        let operation = self.config.operation;
        let cancel = self.cancel.child_token();

        let shared = Arc::new(Shared {
            client: Arc::clone(&self.client),
            progress: Arc::clone(&self.progress),
            policy: self.config.retry,
            operation,
            queue: Mutex::new(records.iter().cloned().enumerate().collect()),
            aggregator: ResultAggregator::new(operation, total),
            cancel: cancel.clone(),
        });

        info!(total, workers, %operation, "Starting batch");
        self.progress.on_batch_started(total).await;
        self.progress.on_phase(Phase::Dispatching).await;

        let timer = self
            .config
            .batch_timeout
            .map(|limit| spawn_timeout(limit, cancel.clone()));

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(worker_loop(worker, Arc::clone(&shared)));
        }
        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Submission worker stopped abnormally");
            }
        }
        if let Some(timer) = timer {
            timer.abort();
        }

        let cancelled = cancel.is_cancelled();
        if cancelled {
            self.progress.on_phase(Phase::Cancelling).await;
        }

        for (index, record) in shared.drain_queue() {
            let cause = if cancelled {
                FailureCause::cancelled("batch cancelled before dispatch")
            } else {
                FailureCause::new(FailureKind::Internal, "no worker left to dispatch record")
            };
            shared
                .finish(SubmissionOutcome::failure(index, record, 0, cause, Duration::ZERO))
                .await;
        }

        // A panicking worker takes its current record with it.
        for (index, record) in records.iter().enumerate() {
            if !shared.aggregator.has_outcome(index) {
                let cause = FailureCause::new(
                    FailureKind::Internal,
                    "worker stopped before recording an outcome",
                );
                shared
                    .finish(SubmissionOutcome::failure(
                        index,
                        record.clone(),
                        0,
                        cause,
                        Duration::ZERO,
                    ))
                    .await;
            }
        }

        let shared = Arc::try_unwrap(shared).map_err(|_| {
            Error::Internal("worker state still referenced after pool shutdown".to_string())
        })?;
        let summary = shared.aggregator.finalize()?;

        self.progress.on_phase(Phase::Complete).await;
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled_count(),
            "Batch finished"
        );

        Ok(summary)
    }
}

/// State shared by the workers of one run
struct Shared {
    client: Arc<dyn RemoteClient>,
    progress: Arc<dyn ProgressCallback>,
    policy: RetryPolicy,
    operation: Operation,
    queue: Mutex<VecDeque<(usize, Record)>>,
    aggregator: ResultAggregator,
    cancel: CancellationToken,
}

impl Shared {
    fn next_record(&self) -> Option<(usize, Record)> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn drain_queue(&self) -> Vec<(usize, Record)> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// Run one record's attempts until it succeeds, fails for good, or the
    /// batch is cancelled
    async fn process(&self, index: usize, record: Record) -> SubmissionOutcome {
        let started = Instant::now();
        let mut attempt: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                let cause = FailureCause::cancelled("batch cancelled before next attempt");
                return SubmissionOutcome::failure(index, record, attempt, cause, started.elapsed());
            }

            attempt += 1;
            debug!(row = record.row, attempt, "Dispatching record");

            let result = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                r = self.dispatch(&record) => Some(r),
            };
            let Some(result) = result else {
                let cause = FailureCause::cancelled("batch cancelled while request was in flight");
                return SubmissionOutcome::failure(index, record, attempt, cause, started.elapsed());
            };

            match self.classify(attempt, result) {
                AttemptOutcome::Success(remote_id) => {
                    return SubmissionOutcome::success(
                        index,
                        record,
                        remote_id,
                        attempt,
                        started.elapsed(),
                    );
                }
                AttemptOutcome::TerminalFailure(cause) => {
                    self.progress
                        .on_attempt_failed(&record, attempt, &cause, None)
                        .await;
                    return SubmissionOutcome::failure(index, record, attempt, cause, started.elapsed());
                }
                AttemptOutcome::RetryableFailure(cause) => {
                    let delay = self.policy.next_delay(attempt);
                    warn!(
                        row = record.row,
                        title = %record.title,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        cause = %cause,
                        "Attempt failed, retrying"
                    );
                    self.progress
                        .on_attempt_failed(&record, attempt, &cause, Some(delay))
                        .await;

                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => {
                            let cause = FailureCause::cancelled(format!(
                                "batch cancelled during backoff after: {cause}"
                            ));
                            return SubmissionOutcome::failure(
                                index,
                                record,
                                attempt,
                                cause,
                                started.elapsed(),
                            );
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn dispatch(&self, record: &Record) -> RemoteResult<Option<String>> {
        match self.operation {
            Operation::Create => self.client.submit(record).await.map(Some),
            Operation::Delete => self
                .client
                .delete(record)
                .await
                .map(|()| Some(record.parent.clone()).filter(|id| !id.is_empty())),
        }
    }

    fn classify(&self, attempt: u32, result: RemoteResult<Option<String>>) -> AttemptOutcome {
        match result {
            Ok(remote_id) => AttemptOutcome::Success(remote_id),
            Err(cause) if self.policy.should_retry(attempt, cause.kind) => {
                AttemptOutcome::RetryableFailure(cause)
            }
            Err(cause) => AttemptOutcome::TerminalFailure(cause),
        }
    }

    async fn finish(&self, outcome: SubmissionOutcome) {
        if outcome.succeeded {
            info!(
                row = outcome.record.row,
                title = %outcome.record.title,
                remote_id = outcome.remote_id.as_deref().unwrap_or("-"),
                attempts = outcome.attempts_made,
                "Record succeeded"
            );
        } else {
            let cause = outcome
                .last_error
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            error!(
                row = outcome.record.row,
                title = %outcome.record.title,
                attempts = outcome.attempts_made,
                cause = %cause,
                "Record failed"
            );
        }

        self.progress.on_outcome(&outcome).await;

        if let Err(e) = self.aggregator.record(outcome) {
            error!(error = %e, "Outcome rejected by aggregator");
            self.progress.on_error(&e).await;
        }
    }
}

async fn worker_loop(worker: usize, shared: Arc<Shared>) {
    while !shared.cancel.is_cancelled() {
        let Some((index, record)) = shared.next_record() else {
            break;
        };
        debug!(worker, index, "Worker picked up record");
        let outcome = shared.process(index, record).await;
        shared.finish(outcome).await;
    }
    debug!(worker, "Worker exiting");
}

fn spawn_timeout(limit: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(limit) => {
                warn!(limit_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX), "Batch timeout reached, cancelling");
                cancel.cancel();
            }
            () = cancel.cancelled() => {}
        }
    })
}
