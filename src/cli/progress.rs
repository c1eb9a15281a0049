//! CLI progress callback with styled output and a progress bar

use crate::cli::style::{Stream, Stylize, bar_style, check, cross, hyperlink_url, retry};
use anstream::{eprintln, println};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use workitem_batch::error::Error;
use workitem_batch::remote::AzureDevOpsClient;
use workitem_batch::submit::{Phase, ProgressCallback};
use workitem_batch::types::{FailureCause, Operation, Record, SubmissionOutcome};

/// CLI progress callback
///
/// Per-record lines are printed above the bar via [`ProgressBar::suspend`]
/// so the two never interleave. The bar hides itself when stderr is not a
/// terminal.
pub struct CliProgress {
    operation: Operation,
    bar: ProgressBar,
    links: Option<Arc<AzureDevOpsClient>>,
}

impl CliProgress {
    /// Create progress output for one batch
    pub fn new(operation: Operation) -> Self {
        let bar = ProgressBar::new(0).with_style(bar_style());
        Self {
            operation,
            bar,
            links: None,
        }
    }

    /// Print clickable links to created work items
    #[must_use]
    pub fn with_links(mut self, client: Arc<AzureDevOpsClient>) -> Self {
        self.links = Some(client);
        self
    }

    const fn done_verb(&self) -> &'static str {
        match self.operation {
            Operation::Create => "Created",
            Operation::Delete => "Deleted",
        }
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_phase(&self, phase: Phase) {
        match phase {
            Phase::Validating => {
                self.bar
                    .suspend(|| println!("{}...", phase.to_string().emphasis()));
            }
            Phase::Dispatching => {
                self.bar.set_message(phase.to_string());
                self.bar.enable_steady_tick(Duration::from_millis(100));
            }
            Phase::Cancelling => {
                self.bar.set_message(phase.to_string());
                self.bar.suspend(|| {
                    eprintln!(
                        "{}",
                        "Cancelling: waiting for in-flight requests".warn()
                    );
                });
            }
            Phase::Complete => self.bar.finish_and_clear(),
        }
    }

    async fn on_batch_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.suspend(|| {
            println!(
                "Sending {} record{}",
                total.accent(),
                if total == 1 { "" } else { "s" }
            );
        });
    }

    async fn on_attempt_failed(
        &self,
        record: &Record,
        attempt: u32,
        cause: &FailureCause,
        retry_in: Option<Duration>,
    ) {
        let Some(delay) = retry_in else {
            return;
        };
        self.bar.suspend(|| {
            eprintln!(
                "  {} {} attempt {attempt} failed: {} {}",
                retry(),
                record.title.accent().for_stderr(),
                cause.to_string().warn(),
                format!("(retrying in {}ms)", delay.as_millis()).muted().for_stderr()
            );
        });
    }

    async fn on_outcome(&self, outcome: &SubmissionOutcome) {
        let row = format!("row {}", outcome.record.row);
        if outcome.succeeded {
            let id = outcome.remote_id.as_deref().unwrap_or("-");
            let link = self
                .links
                .as_ref()
                .filter(|_| self.operation == Operation::Create && id != "-")
                .map(|client| hyperlink_url(Stream::Stdout, &client.work_item_url(&outcome.record, id)));
            self.bar.suspend(|| {
                println!(
                    "  {} {} {} {} {}",
                    check(),
                    self.done_verb(),
                    format!("#{id}").accent(),
                    outcome.record.title.emphasis(),
                    row.muted()
                );
                if let Some(link) = &link {
                    println!("    {link}");
                }
            });
        } else {
            let cause = outcome
                .last_error
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            self.bar.suspend(|| {
                eprintln!(
                    "  {} {} {} after {} attempt(s): {}",
                    cross(),
                    outcome.record.title.accent().for_stderr(),
                    row.muted().for_stderr(),
                    outcome.attempts_made,
                    cause.error()
                );
            });
        }
        self.bar.inc(1);
    }

    async fn on_error(&self, err: &Error) {
        self.bar
            .suspend(|| eprintln!("{}: {}", "error".error(), err));
    }

    async fn on_message(&self, message: &str) {
        self.bar.suspend(|| println!("{}", message.muted()));
    }
}
