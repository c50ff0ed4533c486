//! Deadline-bounded GET requests and the retry loop around them.
//!
//! Nothing here looks at HTTP status codes: a response that arrives in time is
//! handed back as-is, and only timeouts and transport failures are retried.

use std::{fmt::Display, future::Future, time::Duration};

use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::error::{CepError, FetchError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total number of attempts, first one included.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait between attempt `attempt` and `attempt + 1` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Issue a single GET, giving up after `timeout`.
///
/// Dropping the send future on expiry aborts the in-flight request.
pub async fn fetch_with_timeout(
    http: &Client,
    url: &str,
    timeout: Duration,
) -> Result<Response, FetchError> {
    debug!(%url, ?timeout, "sending request");

    match tokio::time::timeout(timeout, http.get(url).send()).await {
        Ok(Ok(res)) => Ok(res),
        Ok(Err(err)) => Err(FetchError::Transport(err)),
        Err(elapsed) => Err(CepError::timeout().with_source(elapsed).into()),
    }
}

/// Run `op` until it succeeds or the policy is exhausted, sleeping with
/// exponential backoff in between. The last error is returned untouched.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt = attempt + 1,
                    of = policy.attempts(),
                    ?delay,
                    error = %err,
                    "attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

pub async fn fetch_with_retry(
    http: &Client,
    url: &str,
    timeout: Duration,
    policy: RetryPolicy,
) -> Result<Response, FetchError> {
    retry_with_backoff(policy, |_| fetch_with_timeout(http, url, timeout)).await
}

/// Shorten a response body for log output.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "ã".repeat(150);
        let short = truncate_body(&body);
        assert!(short.ends_with("..."));
        assert!(short.len() <= 203);
        assert_eq!(truncate_body("ok"), "ok");
    }

    #[test]
    fn default_policy_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts(), 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_op_is_attempted_three_times_with_backoff() {
        let start = Instant::now();
        let mut offsets = Vec::new();

        let result: Result<(), String> = retry_with_backoff(RetryPolicy::default(), |attempt| {
            offsets.push(start.elapsed());
            async move { Err(format!("attempt {attempt} failed")) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "attempt 2 failed");
        assert_eq!(offsets.len(), 3);

        let first_gap = offsets[1] - offsets[0];
        let second_gap = offsets[2] - offsets[1];
        assert!(first_gap >= Duration::from_millis(500) && first_gap < Duration::from_millis(600));
        assert!(
            second_gap >= Duration::from_millis(1000) && second_gap < Duration::from_millis(1100)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_retrying() {
        let mut calls = 0;

        let result: Result<&str, String> = retry_with_backoff(RetryPolicy::default(), |attempt| {
            calls += 1;
            async move {
                if attempt == 0 { Err("boom".to_string()) } else { Ok("done") }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_means_single_attempt() {
        let mut calls = 0;

        let result: Result<(), &str> =
            retry_with_backoff(RetryPolicy::new(0, Duration::from_millis(500)), |_| {
                calls += 1;
                async { Err("nope") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
