//! Mock remote client for testing
//!
//! These are test utilities - not all may be used in every test binary.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use workitem_batch::error::Error;
use workitem_batch::remote::{RemoteClient, RemoteResult};
use workitem_batch::submit::{Phase, ProgressCallback};
use workitem_batch::types::{FailureCause, FailureKind, Record, SubmissionOutcome};

/// Scripted response for one call
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Succeed with an auto-assigned id
    Ok,
    /// Fail with the given cause
    Fail(FailureCause),
    /// Never respond
    Hang,
}

impl MockResponse {
    /// Retryable failure (HTTP 503)
    pub fn unavailable() -> Self {
        Self::Fail(FailureCause::from_response(503, "service unavailable"))
    }

    /// Permanent failure (HTTP 400)
    pub fn rejected() -> Self {
        Self::Fail(FailureCause::from_response(400, "bad request"))
    }

    /// Retryable transport failure
    pub fn transport() -> Self {
        Self::Fail(FailureCause::new(FailureKind::Transport, "connection reset"))
    }
}

/// Call record for one remote call
#[derive(Debug, Clone)]
pub struct Call {
    pub title: String,
    pub at: Instant,
}

/// Simple mock remote client for testing
///
/// Features:
/// - Auto-incrementing work item ids
/// - Per-title response scripts; an exhausted script succeeds
/// - Fixed latency per call (works with a paused tokio clock)
/// - In-flight tracking to verify the concurrency bound
/// - Call tracking for verification
pub struct MockRemoteClient {
    next_id: AtomicU64,
    latency: Duration,
    scripts: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    fallback: Mutex<Option<MockResponse>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    // Call tracking
    submit_calls: Mutex<Vec<Call>>,
    delete_calls: Mutex<Vec<String>>,
}

impl Default for MockRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteClient {
    /// Create a mock that answers immediately
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    /// Create a mock that takes `latency` to answer each call
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            latency,
            scripts: Mutex::new(HashMap::new()),
            fallback: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            submit_calls: Mutex::new(Vec::new()),
            delete_calls: Mutex::new(Vec::new()),
        }
    }

    // === Response scripting ===

    /// Queue responses for the record with `title`, in call order
    pub fn script(&self, title: &str, responses: Vec<MockResponse>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(title.to_string(), responses.into());
    }

    /// Answer every call with `response` once scripts run out
    pub fn always(&self, response: MockResponse) {
        *self.fallback.lock().unwrap() = Some(response);
    }

    // === Call verification ===

    /// All `submit` calls in order
    pub fn submit_calls(&self) -> Vec<Call> {
        self.submit_calls.lock().unwrap().clone()
    }

    /// Number of `submit` calls for `title`
    pub fn calls_for(&self, title: &str) -> usize {
        self.submit_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.title == title)
            .count()
    }

    /// Times of the `submit` calls for `title`
    pub fn call_times(&self, title: &str) -> Vec<Instant> {
        self.submit_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.title == title)
            .map(|c| c.at)
            .collect()
    }

    /// Parent ids passed to `delete`, in order
    pub fn delete_calls(&self) -> Vec<String> {
        self.delete_calls.lock().unwrap().clone()
    }

    /// Highest number of calls observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Assert the gaps between consecutive calls for `title`
    pub fn assert_gaps(&self, title: &str, expected_ms: &[u64]) {
        let times = self.call_times(title);
        let gaps: Vec<u128> = times
            .windows(2)
            .map(|w| (w[1] - w[0]).as_millis())
            .collect();
        assert_eq!(
            gaps.len(),
            expected_ms.len(),
            "Expected {} retries for {title} but got gaps {gaps:?}",
            expected_ms.len()
        );
        for (gap, expected) in gaps.iter().zip(expected_ms) {
            let expected = u128::from(*expected);
            assert!(
                *gap >= expected && *gap < expected + 50,
                "Expected gap of ~{expected}ms for {title} but got {gaps:?}"
            );
        }
    }

    fn next_response(&self, title: &str) -> MockResponse {
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(title)
            .and_then(VecDeque::pop_front);
        scripted
            .or_else(|| self.fallback.lock().unwrap().clone())
            .unwrap_or(MockResponse::Ok)
    }

    async fn respond(&self, title: &str) -> RemoteResult<String> {
        let _guard = InFlight::enter(&self.in_flight, &self.max_in_flight);
        let response = self.next_response(title);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match response {
            MockResponse::Ok => Ok(self.next_id.fetch_add(1, Ordering::SeqCst).to_string()),
            MockResponse::Fail(cause) => Err(cause),
            MockResponse::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
    async fn submit(&self, record: &Record) -> RemoteResult<String> {
        self.submit_calls.lock().unwrap().push(Call {
            title: record.title.clone(),
            at: Instant::now(),
        });
        self.respond(&record.title).await
    }

    async fn delete(&self, record: &Record) -> RemoteResult<()> {
        self.delete_calls.lock().unwrap().push(record.parent.clone());
        self.respond(&record.title).await.map(|_| ())
    }
}

/// Decrements the in-flight count when the call ends or is dropped mid-way
struct InFlight<'a> {
    count: &'a AtomicUsize,
}

impl<'a> InFlight<'a> {
    fn enter(count: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let now = count.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(now, Ordering::SeqCst);
        Self { count }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Progress callback that records every event
#[derive(Default)]
pub struct RecordingProgress {
    pub phases: Mutex<Vec<Phase>>,
    pub started: Mutex<Option<usize>>,
    pub attempt_failures: Mutex<Vec<(String, u32, Option<Duration>)>>,
    pub outcomes: Mutex<Vec<SubmissionOutcome>>,
    pub messages: Mutex<Vec<String>>,
}

impl RecordingProgress {
    /// Titles of reported outcomes, in report order
    pub fn outcome_titles(&self) -> Vec<String> {
        self.outcomes
            .lock()
            .unwrap()
            .iter()
            .map(|o| o.record.title.clone())
            .collect()
    }
}

#[async_trait]
impl ProgressCallback for RecordingProgress {
    async fn on_phase(&self, phase: Phase) {
        self.phases.lock().unwrap().push(phase);
    }

    async fn on_batch_started(&self, total: usize) {
        *self.started.lock().unwrap() = Some(total);
    }

    async fn on_attempt_failed(
        &self,
        record: &Record,
        attempt: u32,
        _cause: &FailureCause,
        retry_in: Option<Duration>,
    ) {
        self.attempt_failures
            .lock()
            .unwrap()
            .push((record.title.clone(), attempt, retry_in));
    }

    async fn on_outcome(&self, outcome: &SubmissionOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    async fn on_error(&self, _error: &Error) {}

    async fn on_message(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}
