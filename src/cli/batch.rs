//! Batch command - submit or delete every record in a CSV file

use crate::cli::progress::CliProgress;
use crate::cli::style::{Stylize, arrow, check, cross};
use anstream::{eprintln, println};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use workitem_batch::config::{Overrides, Settings};
use workitem_batch::error::{Error, Result};
use workitem_batch::input::{ParsedInput, parse_csv_path};
use workitem_batch::remote::{AzureDevOpsClient, RemoteClient, build_create_payload};
use workitem_batch::submit::{Orchestrator, ProgressCallback};
use workitem_batch::types::{Operation, Record, SubmissionSummary};
use workitem_batch::validate::RecordIssues;

/// Everything the batch command needs from the command line
pub struct BatchOptions {
    /// What to do with each record
    pub operation: Operation,
    /// `--config`
    pub config_path: Option<PathBuf>,
    /// Flag overrides
    pub overrides: Overrides,
    /// Print the plan instead of sending anything
    pub dry_run: bool,
    /// Where to write the JSON summary
    pub report: Option<PathBuf>,
}

/// Run the submit or delete command
pub async fn run_batch(options: &BatchOptions) -> Result<()> {
    let settings = Settings::load(options.config_path.as_deref(), &options.overrides)?;

    let ParsedInput { records, errors } = parse_csv_path(&settings.csv_file)?;
    if !errors.is_empty() {
        for row_error in &errors {
            eprintln!("{} {}", cross(), row_error.to_string().error());
        }
        if !settings.continue_on_error {
            return Err(Error::InputRows {
                count: errors.len(),
            });
        }
        eprintln!(
            "{}",
            format!("Skipping {} unreadable row(s)", errors.len()).warn()
        );
    }
    info!(
        path = %settings.csv_file.display(),
        records = records.len(),
        "Loaded input"
    );

    let orchestrator = Orchestrator::new(settings.orchestrator_config(options.operation));
    let client = Arc::new(AzureDevOpsClient::new(
        &settings.api,
        settings.http_timeout(),
    )?);

    if options.dry_run {
        let result = orchestrator.prepare(records);
        if let Err(Error::Validation { details, .. }) = &result {
            print_validation_details(details);
        }
        let (eligible, skipped) = result?;
        print_dry_run(options.operation, &client, &settings, &eligible, &skipped);
        return Ok(());
    }

    let progress: Arc<dyn ProgressCallback> =
        Arc::new(CliProgress::new(options.operation).with_links(Arc::clone(&client)));
    let remote: Arc<dyn RemoteClient> = client;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));
    let result = orchestrator
        .with_cancellation(cancel)
        .run(records, remote, progress)
        .await;
    watcher.abort();

    match result {
        Ok(report) => {
            print_skipped(&report.skipped);
            print_summary(&report.summary);
            write_report(options.report.as_deref(), &report.summary)?;
            Ok(())
        }
        Err(Error::BatchFailed(summary)) => {
            print_summary(&summary);
            write_report(options.report.as_deref(), &summary)?;
            Err(Error::BatchFailed(summary))
        }
        Err(e) => {
            if let Error::Validation { details, .. } = &e {
                print_validation_details(details);
            }
            Err(e)
        }
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Interrupt received, cancelling batch");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
    }
}

fn print_dry_run(
    operation: Operation,
    client: &AzureDevOpsClient,
    settings: &Settings,
    eligible: &[Record],
    skipped: &[RecordIssues],
) {
    println!(
        "{} would {} {} record(s):",
        "Dry run:".emphasis(),
        operation,
        eligible.len().accent()
    );
    for record in eligible {
        println!(
            "  {} {} {}",
            arrow(),
            record.title.emphasis(),
            format!("row {}", record.row).muted()
        );
        match operation {
            Operation::Create => {
                println!("    POST {}", client.create_url(record).muted());
                let body = build_create_payload(record, &settings.api.base_url);
                let ops = body.as_array().map_or(0, Vec::len);
                println!("    {} patch operation(s)", ops.muted());
            }
            Operation::Delete => {
                println!(
                    "    DELETE {}",
                    client.item_url(record, &record.parent).muted()
                );
            }
        }
    }
    print_skipped(skipped);
}

fn print_skipped(skipped: &[RecordIssues]) {
    if skipped.is_empty() {
        return;
    }
    eprintln!(
        "{}",
        format!("Skipped {} record(s):", skipped.len()).warn()
    );
    for line in skipped.iter().flat_map(RecordIssues::lines) {
        eprintln!("  {} {}", cross(), line);
    }
}

fn print_validation_details(details: &[String]) {
    eprintln!("{}", "Validation failed:".error());
    for line in details {
        eprintln!("  {} {}", cross(), line);
    }
}

fn print_summary(summary: &SubmissionSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    println!();
    if summary.is_success() {
        println!(
            "{} {} of {} record(s) {} {}",
            check(),
            summary.succeeded.accent(),
            summary.total,
            "succeeded".success(),
            format!("({}ms)", elapsed.num_milliseconds()).muted()
        );
        return;
    }

    println!(
        "{} succeeded, {} failed of {} record(s) {}",
        summary.succeeded.accent(),
        summary.failed.error().for_stdout(),
        summary.total,
        format!("({}ms)", elapsed.num_milliseconds()).muted()
    );
    let cancelled = summary.cancelled_count();
    if cancelled > 0 {
        println!("  {} cancelled before completing", cancelled.warn().for_stdout());
    }
    for failure in &summary.failures {
        let cause = failure
            .last_error
            .as_ref()
            .map_or_else(String::new, ToString::to_string);
        println!(
            "  {} {} {}: {}",
            cross().for_stdout(),
            failure.record.title,
            format!("row {}", failure.record.row).muted(),
            cause
        );
    }
}

fn write_report(path: Option<&Path>, summary: &SubmissionSummary) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    println!("Report written to {}", path.display().accent());
    Ok(())
}
