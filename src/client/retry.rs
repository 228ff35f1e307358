//! Bounded exponential backoff shared by every remote delete and listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{DecomError, Result};

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each subsequent retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// HTTP statuses treated as transient.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8_000
}
fn default_retryable_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retryable_statuses: default_retryable_statuses(),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            ..Self::default()
        }
    }

    /// Whether an HTTP status should be retried.
    #[must_use]
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether the error should be retried after `attempt` (1-based) attempts.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &DecomError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// `min(base * 2^(attempt-1), max)` for the retry following `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// Run `f` until it succeeds, fails permanently, or attempts run out.
    ///
    /// With a `deadline` (the ephemeral key expiry) no retry is scheduled whose
    /// backoff would end at or past it; the call fails with `KeyExpired` instead.
    /// On exhaustion the last transient error is returned unchanged.
    pub async fn execute<F, Fut, T>(
        &self,
        operation: &str,
        deadline: Option<DateTime<Utc>>,
        mut f: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_retryable() {
                            warn!(operation, attempts = attempt, error = %error, "retries exhausted");
                        }
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    if let Some(deadline) = deadline {
                        let fits = chrono::Duration::from_std(delay)
                            .ok()
                            .and_then(|d| Utc::now().checked_add_signed(d))
                            .is_some_and(|resume_at| resume_at < deadline);
                        if !fits {
                            warn!(operation, attempt, "backoff would outlive the api key");
                            return Err(DecomError::KeyExpired {
                                expired_at: deadline,
                            });
                        }
                    }

                    debug!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
