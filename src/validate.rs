//! Field-level record validation

use crate::types::{Operation, Record};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+_.-]+@(.+)$").expect("hardcoded email regex is valid"))
}

fn numeric_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+(\.\d+)?$").expect("hardcoded numeric regex is valid"))
}

/// A single problem with a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Column the problem was found in
    pub field: &'static str,
    /// Human-readable explanation
    pub message: String,
}

impl ValidationIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Required-field problems only: what makes a record ineligible to submit
pub fn eligibility_issues(record: &Record, operation: Operation) -> Vec<ValidationIssue> {
    let required: [(&'static str, &str); 5] = [
        ("title", &record.title),
        ("organization", &record.organization),
        ("project", &record.project),
        ("principal", &record.principal),
        ("credential", &record.credential),
    ];

    let mut issues: Vec<ValidationIssue> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|&(field, _)| ValidationIssue::new(field, "is required"))
        .collect();

    if operation == Operation::Delete && record.parent.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "parent",
            "is required to identify the work item to delete",
        ));
    }

    issues
}

/// Full validation: required fields plus format checks
pub fn validate_record(record: &Record, operation: Operation) -> Vec<ValidationIssue> {
    let mut issues = eligibility_issues(record, operation);

    if !record.assignee.is_empty() && !email_pattern().is_match(&record.assignee) {
        issues.push(ValidationIssue::new(
            "assignee",
            format!("must be a valid email address, got {:?}", record.assignee),
        ));
    }

    let numeric_fields = [
        ("original_estimate", &record.original_estimate),
        ("remaining_work", &record.remaining_work),
        ("parent", &record.parent),
    ];
    for (field, value) in numeric_fields {
        if !value.is_empty() && !numeric_pattern().is_match(value) {
            issues.push(ValidationIssue::new(
                field,
                format!("must be a number, got {value:?}"),
            ));
        }
    }

    issues
}

/// Validation problems for one record
#[derive(Debug, Clone)]
pub struct RecordIssues {
    /// Source row of the record
    pub row: usize,
    /// Title, for reporting
    pub title: String,
    /// Problems found
    pub issues: Vec<ValidationIssue>,
}

impl RecordIssues {
    /// One line per issue, prefixed with the row
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.issues
            .iter()
            .map(move |issue| format!("row {}: {issue}", self.row))
    }
}

/// Split records into those passing `check` and the problems of the rest
pub fn partition<F>(records: Vec<Record>, check: F) -> (Vec<Record>, Vec<RecordIssues>)
where
    F: Fn(&Record) -> Vec<ValidationIssue>,
{
    let mut valid = Vec::with_capacity(records.len());
    let mut invalid = Vec::new();

    for record in records {
        let issues = check(&record);
        if issues.is_empty() {
            valid.push(record);
        } else {
            invalid.push(RecordIssues {
                row: record.row,
                title: record.title.clone(),
                issues,
            });
        }
    }

    (valid, invalid)
}
