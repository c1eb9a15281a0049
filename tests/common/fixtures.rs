//! Test data factories for workitem-batch types
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use std::time::Duration;
use workitem_batch::submit::{EngineConfig, OrchestratorConfig, RetryPolicy};
use workitem_batch::types::{Operation, Record};

/// CSV header in column order
pub const CSV_HEADER: &str = "Title,Description,AssignedTo,IterationPath,AreaPath,OriginalEstimate,RemainingWork,Parent,Organization,Project,Area,User,Token";

/// Create an eligible record with default values
pub fn make_record(title: &str) -> Record {
    Record {
        row: 2,
        title: title.to_string(),
        description: format!("Description of {title}"),
        assignee: "dev@contoso.com".to_string(),
        iteration_path: "web\\Sprint 1".to_string(),
        area_path: "web\\Backend".to_string(),
        original_estimate: "4".to_string(),
        remaining_work: "4".to_string(),
        parent: "100".to_string(),
        organization: "contoso".to_string(),
        project: "web".to_string(),
        area: String::new(),
        principal: "dev@contoso.com".to_string(),
        credential: "pat".to_string(),
    }
}

/// Create records titled `Task 0..count` with consecutive rows
pub fn make_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record {
            row: i + 2,
            ..make_record(&format!("Task {i}"))
        })
        .collect()
}

/// Create a record missing its credential
pub fn make_ineligible_record(title: &str) -> Record {
    Record {
        credential: String::new(),
        ..make_record(title)
    }
}

/// Create a record that is eligible but fails format validation
pub fn make_invalid_record(title: &str) -> Record {
    Record {
        assignee: "not an email".to_string(),
        ..make_record(title)
    }
}

/// Retry policy with the usual test timings
pub fn make_policy(max_attempts: i32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(1000),
        Duration::from_millis(10_000),
    )
}

/// Engine config for creating records
pub fn make_engine_config(max_concurrent_tasks: usize, max_attempts: i32) -> EngineConfig {
    EngineConfig {
        operation: Operation::Create,
        max_concurrent_tasks,
        retry: make_policy(max_attempts),
        batch_timeout: None,
    }
}

/// Orchestrator config with validation on
pub fn make_orchestrator_config(continue_on_error: bool) -> OrchestratorConfig {
    OrchestratorConfig {
        validate_before_processing: true,
        continue_on_error,
        engine: make_engine_config(5, 3),
    }
}

/// One CSV data row for `title`
pub fn csv_row(title: &str) -> String {
    format!("{title},desc,dev@contoso.com,web\\Sprint 1,web\\Backend,4,4,100,contoso,web,,dev@contoso.com,pat")
}
