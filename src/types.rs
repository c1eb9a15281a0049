//! Core types for workitem-batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Upper bound on the response body kept in a [`FailureCause`]
const MAX_DETAIL_CHARS: usize = 512;

/// One work item to create, as read from a single input row
///
/// Records are never mutated after parsing; submission progress lives in the
/// engine's outcome tracking, not here.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// 1-based row in the source file (header is row 1)
    pub row: usize,
    /// Work item title
    pub title: String,
    /// Work item description (HTML allowed by the service)
    pub description: String,
    /// Assignee, usually an email address
    pub assignee: String,
    /// Iteration path (sprint)
    pub iteration_path: String,
    /// Area path
    pub area_path: String,
    /// Original estimate in hours
    pub original_estimate: String,
    /// Remaining work in hours
    pub remaining_work: String,
    /// Id of the containing work item
    pub parent: String,
    /// Azure DevOps organization
    pub organization: String,
    /// Azure DevOps project
    pub project: String,
    /// Area name, used when `area_path` is empty
    pub area: String,
    /// User name for basic auth
    pub principal: String,
    /// Personal access token for basic auth
    #[serde(skip_serializing, default)]
    pub credential: String,
}

impl Record {
    /// Whether every field required to reach the remote service is present
    pub fn is_eligible(&self) -> bool {
        [
            &self.title,
            &self.organization,
            &self.project,
            &self.principal,
            &self.credential,
        ]
        .iter()
        .all(|f| !f.trim().is_empty())
    }

    /// Area path to send, falling back to the area column
    pub fn effective_area_path(&self) -> &str {
        if self.area_path.is_empty() {
            &self.area
        } else {
            &self.area_path
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("row", &self.row)
            .field("title", &self.title)
            .field("assignee", &self.assignee)
            .field("parent", &self.parent)
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("principal", &self.principal)
            .field("credential", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// What the batch does with each record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create a new work item
    #[default]
    Create,
    /// Delete the work item referenced by the record's parent column
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Classification of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection failure, timeout, or other network-level error
    Transport,
    /// HTTP 429
    RateLimited,
    /// HTTP 503
    Unavailable,
    /// Any other non-success response, or an unusable success body
    Rejected,
    /// HTTP 401 / 403
    Auth,
    /// Batch was cancelled before the record finished
    Cancelled,
    /// Engine invariant violation (e.g. a worker panicked)
    Internal,
}

impl FailureKind {
    /// Whether another attempt could plausibly succeed
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Transport | Self::RateLimited | Self::Unavailable)
    }

    /// Classify an HTTP status code that is not a success
    pub const fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            503 => Self::Unavailable,
            401 | 403 => Self::Auth,
            _ => Self::Rejected,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Transport => "transport error",
            Self::RateLimited => "rate limited",
            Self::Unavailable => "service unavailable",
            Self::Rejected => "rejected",
            Self::Auth => "authentication failed",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal error",
        };
        write!(f, "{s}")
    }
}

/// Why a remote call failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    /// Classification used for retry decisions
    pub kind: FailureKind,
    /// HTTP status, when a response was received
    pub status: Option<u16>,
    /// Diagnostic text (body snippet or transport message)
    pub detail: String,
}

impl FailureCause {
    /// Create a cause without an HTTP status
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            detail: truncate_detail(detail.into()),
        }
    }

    /// Create a cause from a non-success HTTP response
    pub fn from_response(status: u16, body: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::from_status(status),
            status: Some(status),
            detail: truncate_detail(body.into()),
        }
    }

    /// Cause recorded for work cut short by cancellation
    pub fn cancelled(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Cancelled, detail)
    }

    /// Whether the failure is worth retrying
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status})", self.kind)?,
            None => write!(f, "{}", self.kind)?,
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

fn truncate_detail(detail: String) -> String {
    if detail.chars().count() <= MAX_DETAIL_CHARS {
        return detail;
    }
    let mut cut: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
    cut.push('…');
    cut
}

/// Result of a single attempt, before the engine decides what comes next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Remote call succeeded; carries the remote id when one exists
    Success(Option<String>),
    /// Failed, and the policy allows another attempt
    RetryableFailure(FailureCause),
    /// Failed for good
    TerminalFailure(FailureCause),
}

/// Terminal result for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Position of the record in the submitted batch
    pub index: usize,
    /// The record itself
    pub record: Record,
    /// Whether the record was submitted successfully
    pub succeeded: bool,
    /// Id of the created (or deleted) work item
    pub remote_id: Option<String>,
    /// Number of remote calls made for this record
    pub attempts_made: u32,
    /// Cause of the last failed attempt
    pub last_error: Option<FailureCause>,
    /// Time from first attempt to terminal outcome
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl SubmissionOutcome {
    /// Outcome for a record that succeeded
    pub fn success(
        index: usize,
        record: Record,
        remote_id: Option<String>,
        attempts_made: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            index,
            record,
            succeeded: true,
            remote_id,
            attempts_made,
            last_error: None,
            elapsed,
        }
    }

    /// Outcome for a record that failed for good
    pub fn failure(
        index: usize,
        record: Record,
        attempts_made: u32,
        cause: FailureCause,
        elapsed: Duration,
    ) -> Self {
        Self {
            index,
            record,
            succeeded: false,
            remote_id: None,
            attempts_made,
            last_error: Some(cause),
            elapsed,
        }
    }
}

/// Aggregate over every record of one batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionSummary {
    /// Operation the batch performed
    pub operation: Operation,
    /// Number of records handed to the engine
    pub total: usize,
    /// Records that succeeded
    pub succeeded: usize,
    /// Records that failed (including cancelled)
    pub failed: usize,
    /// Failed outcomes in completion order
    pub failures: Vec<SubmissionOutcome>,
    /// Successful outcomes in completion order
    pub successes: Vec<SubmissionOutcome>,
    /// When the engine started
    pub started_at: DateTime<Utc>,
    /// When the last outcome was recorded
    pub finished_at: DateTime<Utc>,
}

impl SubmissionSummary {
    /// Whether every record succeeded
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Failures whose last cause was cancellation
    pub fn cancelled_count(&self) -> usize {
        self.failures
            .iter()
            .filter(|o| {
                o.last_error
                    .as_ref()
                    .is_some_and(|c| c.kind == FailureKind::Cancelled)
            })
            .count()
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
