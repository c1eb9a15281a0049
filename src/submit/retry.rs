//! Retry policy with capped exponential backoff

use crate::config::RetrySettings;
use crate::types::FailureKind;
use std::time::Duration;

/// Decides whether a failed attempt is retried and how long to wait first
///
/// Pure: the same inputs always give the same answer, so the engine can call
/// it from any worker without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// `max_attempts <= 0` means exactly one attempt.
    pub fn new(max_attempts: i32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: u32::try_from(max_attempts).unwrap_or(0).max(1),
            initial_delay,
            max_delay,
        }
    }

    /// Build from configuration
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.initial_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
    }

    /// Total attempts a record may use, always at least one
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    ///
    /// `min(initial * 2^(attempt-1), max)`, saturating on overflow.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether failed attempt number `attempt` should be followed by another
    pub const fn should_retry(&self, attempt: u32, kind: FailureKind) -> bool {
        attempt < self.max_attempts && kind.is_retryable()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}
