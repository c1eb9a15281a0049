//! Concurrent batch submission
//!
//! Takes validated records through the remote service:
//! 1. Orchestration - gate records through validation
//! 2. Engine - bounded worker pool with per-record retries
//! 3. Aggregation - collect every outcome into one summary

mod aggregate;
mod engine;
mod orchestrate;
mod progress;
mod retry;

pub use aggregate::ResultAggregator;
pub use engine::{EngineConfig, SubmissionEngine};
pub use orchestrate::{BatchReport, Orchestrator, OrchestratorConfig};
pub use progress::{NoopProgress, Phase, ProgressCallback};
pub use retry::RetryPolicy;
