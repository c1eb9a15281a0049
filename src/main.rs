//! wib - bulk work item creation for Azure DevOps
//!
//! CLI binary for submitting a CSV of work items as one concurrent batch.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use workitem_batch::config::Overrides;
use workitem_batch::types::Operation;

mod cli;

#[derive(Parser)]
#[command(name = "wib")]
#[command(about = "Bulk-create Azure DevOps work items from a CSV file")]
#[command(version)]
struct Cli {
    /// Config file (defaults to workitems.toml in the current directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create one work item per CSV row
    Submit(BatchArgs),

    /// Delete the work items referenced by each row's parent column
    Delete(BatchArgs),
}

#[derive(Args)]
struct BatchArgs {
    /// CSV file with one work item per row
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Attempts per record, including the first (0 or less means one)
    #[arg(long, allow_negative_numbers = true)]
    max_retry_attempts: Option<i32>,

    /// Delay before the first retry, in milliseconds
    #[arg(long, value_name = "MS")]
    initial_retry_delay: Option<u64>,

    /// Upper bound on the retry delay, in milliseconds
    #[arg(long, value_name = "MS")]
    max_retry_delay: Option<u64>,

    /// Per-request HTTP timeout, in milliseconds
    #[arg(long, value_name = "MS")]
    http_timeout: Option<u64>,

    /// Maximum number of requests in flight
    #[arg(long)]
    max_concurrent_tasks: Option<usize>,

    /// Skip email and number format checks
    #[arg(long)]
    skip_validation: bool,

    /// Skip invalid records and exit successfully when some records fail
    #[arg(long)]
    continue_on_error: bool,

    /// Cancel the batch after this many milliseconds
    #[arg(long, value_name = "MS")]
    batch_timeout: Option<u64>,

    /// Service base URL
    #[arg(long)]
    api_base_url: Option<String>,

    /// Work item type to create
    #[arg(long)]
    work_item_type: Option<String>,

    /// Dry run - show what would be sent without contacting the service
    #[arg(long)]
    dry_run: bool,

    /// Write the batch summary as JSON to this file
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

impl BatchArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            csv_file: self.csv.clone(),
            max_retry_attempts: self.max_retry_attempts,
            initial_retry_delay_ms: self.initial_retry_delay,
            max_retry_delay_ms: self.max_retry_delay,
            http_timeout_ms: self.http_timeout,
            max_concurrent_tasks: self.max_concurrent_tasks,
            skip_validation: self.skip_validation,
            continue_on_error: self.continue_on_error,
            batch_timeout_ms: self.batch_timeout,
            api_base_url: self.api_base_url.clone(),
            work_item_type: self.work_item_type.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::logging::init(&cli.log_level);

    let (operation, args) = match &cli.command {
        Commands::Submit(args) => (Operation::Create, args),
        Commands::Delete(args) => (Operation::Delete, args),
    };

    let options = cli::BatchOptions {
        operation,
        config_path: cli.config.clone(),
        overrides: args.overrides(),
        dry_run: args.dry_run,
        report: args.report.clone(),
    };
    cli::run_batch(&options).await?;

    Ok(())
}
