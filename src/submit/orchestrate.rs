//! Batch orchestration
//!
//! Gates records through validation, runs the engine, and turns the summary
//! into a batch-level verdict.

use crate::error::{Error, Result};
use crate::remote::RemoteClient;
use crate::submit::engine::{EngineConfig, SubmissionEngine};
use crate::submit::progress::{Phase, ProgressCallback};
use crate::types::{Record, SubmissionSummary};
use crate::validate::{RecordIssues, eligibility_issues, partition, validate_record};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Orchestrator settings for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Run format validation before anything is sent
    pub validate_before_processing: bool,
    /// Filter invalid records and tolerate failed submissions
    pub continue_on_error: bool,
    /// Engine settings
    pub engine: EngineConfig,
}

/// Outcome of a batch that was not considered a failure
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Engine summary over the submitted records
    pub summary: SubmissionSummary,
    /// Records filtered out before submission
    pub skipped: Vec<RecordIssues>,
}

/// Wires validation, the engine, and the batch verdict together
pub struct Orchestrator {
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl Orchestrator {
    /// Create an orchestrator
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort the batch when `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Check records without submitting anything
    ///
    /// Applies the same gate as [`Orchestrator::run`] and returns the records
    /// that would be submitted plus those that would be skipped.
    pub fn prepare(&self, records: Vec<Record>) -> Result<(Vec<Record>, Vec<RecordIssues>)> {
        if records.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let operation = self.config.engine.operation;

        let (eligible, mut skipped) = partition(records, |r| eligibility_issues(r, operation));

        let eligible = if self.config.validate_before_processing {
            let (valid, invalid) = partition(eligible, |r| validate_record(r, operation));
            // Missing required fields fail validation too
            if (!invalid.is_empty() || !skipped.is_empty()) && !self.config.continue_on_error {
                let details: Vec<String> = skipped
                    .iter()
                    .chain(&invalid)
                    .flat_map(RecordIssues::lines)
                    .collect();
                return Err(Error::Validation {
                    invalid: skipped.len() + invalid.len(),
                    details,
                });
            }
            for rejected in skipped.iter().chain(&invalid) {
                warn!(row = rejected.row, title = %rejected.title, "Skipping invalid record");
            }
            skipped.extend(invalid);
            valid
        } else {
            for rejected in &skipped {
                warn!(row = rejected.row, title = %rejected.title, "Skipping ineligible record");
            }
            eligible
        };

        if eligible.is_empty() {
            return Err(Error::NoEligibleRecords);
        }

        Ok((eligible, skipped))
    }

    /// Validate, submit, and judge one batch
    ///
    /// The client is owned by this call: it is handed to a fresh engine and
    /// dropped when the batch ends.
    pub async fn run(
        &self,
        records: Vec<Record>,
        client: Arc<dyn RemoteClient>,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<BatchReport> {
        progress.on_phase(Phase::Validating).await;
        let (eligible, skipped) = self.prepare(records)?;

        if !skipped.is_empty() {
            progress
                .on_message(&format!(
                    "Skipping {} record(s) that failed validation",
                    skipped.len()
                ))
                .await;
        }
        info!(
            submitting = eligible.len(),
            skipped = skipped.len(),
            "Records ready for submission"
        );

        let engine = SubmissionEngine::new(client, self.config.engine)
            .with_progress(Arc::clone(&progress))
            .with_cancellation(self.cancel.clone());
        let summary = engine.run(&eligible).await?;
        drop(engine);

        if summary.failed > 0 && !self.config.continue_on_error {
            return Err(Error::BatchFailed(Box::new(summary)));
        }
        if summary.failed > 0 {
            warn!(
                failed = summary.failed,
                "Some records failed; continuing because continue-on-error is set"
            );
        }

        Ok(BatchReport { summary, skipped })
    }
}
