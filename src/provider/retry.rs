// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry logic with exponential backoff for provider HTTP calls.
//!
//! Adapters retry transient failures (HTTP 429, 5xx, connection errors) with
//! exponential backoff and fail fast on everything else. The reconciler itself never
//! retries: a failure that outlives the adapter's retries halts the domain.

use rand::Rng;
use reqwest::StatusCode;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::errors::ProviderError;

/// Initial retry interval (250ms)
const INITIAL_INTERVAL_MILLIS: u64 = 250;

/// Maximum interval between retries (10 seconds)
const MAX_INTERVAL_SECS: u64 = 10;

/// Maximum total time to spend retrying one call (1 minute)
const MAX_ELAPSED_TIME_SECS: u64 = 60;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Maximum total elapsed time
    pub max_elapsed_time: Option<Duration>,
    /// Maximum number of attempts, including the first one
    pub max_attempts: Option<u32>,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
    start_time: Instant,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff with specified parameters.
    #[must_use]
    pub fn new(
        initial_interval: Duration,
        max_interval: Duration,
        max_elapsed_time: Option<Duration>,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            current_interval: initial_interval,
            max_interval,
            max_elapsed_time,
            max_attempts,
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
            start_time: Instant::now(),
        }
    }

    /// Get the next backoff interval, or None once the budget is spent.
    ///
    /// `attempt` is the number of attempts made so far.
    pub fn next_backoff(&mut self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        if let Some(max_elapsed) = self.max_elapsed_time {
            if self.start_time.elapsed() >= max_elapsed {
                return None;
            }
        }

        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        Some(jittered)
    }

    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// How an adapter retries transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed_time: Option<Duration>,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Policy for provider HTTP APIs.
    ///
    /// Retries occur at approximately 250ms, 500ms, 1s, 2s, 4s, 8s, then every 10s
    /// until one minute has elapsed.
    #[must_use]
    pub fn http() -> Self {
        Self {
            initial_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
            max_elapsed_time: Some(Duration::from_secs(MAX_ELAPSED_TIME_SECS)),
            max_attempts: None,
        }
    }

    /// Policy that makes exactly one attempt.
    #[must_use]
    pub fn none() -> Self {
        Self {
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            max_elapsed_time: None,
            max_attempts: Some(1),
        }
    }

    /// Policy with a fixed number of attempts and near-zero delays.
    #[must_use]
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed_time: None,
            max_attempts: Some(max_attempts),
        }
    }

    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.initial_interval,
            self.max_interval,
            self.max_elapsed_time,
            self.max_attempts,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::http()
    }
}

/// Determine if an HTTP status code is retryable.
///
/// # Retryable Status Codes
///
/// - **429** (Too Many Requests) - Rate limiting
/// - **500** (Internal Server Error) - Server error
/// - **502** (Bad Gateway) - Proxy/gateway error
/// - **503** (Service Unavailable) - Temporary unavailability
/// - **504** (Gateway Timeout) - Gateway timeout
#[must_use]
pub fn is_retryable_http_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Retry a provider call with exponential backoff.
///
/// Retries while the call fails with a [`ProviderError::Transient`] and the policy's
/// budget allows it; any other error is returned immediately.
///
/// # Arguments
///
/// * `policy` - Retry budget
/// * `operation` - Async function that performs the call
/// * `operation_name` - Human-readable name for logging (e.g., "list records example.com")
///
/// # Errors
///
/// Returns the last error once it is not transient or the budget is spent.
pub async fn retry_provider_call<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
    operation_name: &str,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut backoff = policy.backoff();
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        "Provider call succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if let Some(duration) = backoff.next_backoff(attempt) {
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        retry_after = ?duration,
                        error = %e,
                        "Transient provider error, will retry"
                    );
                    tokio::time::sleep(duration).await;
                } else {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        elapsed = ?start_time.elapsed(),
                        error = %e,
                        "Retry budget exhausted, giving up"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
