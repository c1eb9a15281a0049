//! workitem-batch - bulk work item creation for Azure DevOps
//!
//! Reads work item records from a CSV file and drives them through the
//! Azure DevOps REST API with bounded concurrency, per-record retries with
//! exponential backoff, and an aggregated summary of partial failures.
//!
//! The library is interface-agnostic: the `wib` binary is one consumer, and
//! anything implementing [`submit::ProgressCallback`] can observe a batch.

pub mod config;
pub mod error;
pub mod input;
pub mod remote;
pub mod submit;
pub mod types;
pub mod validate;
