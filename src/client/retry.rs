//! Injectable retry, backoff and exhaustion policies.
//!
//! The executor drives every attempt through three seams:
//!
//! | Trait            | Question                                           | Default                   |
//! |------------------|----------------------------------------------------|---------------------------|
//! | [`RetryPolicy`]  | should this outcome be retried?                    | [`DefaultRetryPolicy`]    |
//! | [`Backoff`]      | how long to wait before the next attempt?          | [`ExponentialBackoff`]    |
//! | [`ErrorHandler`] | what to return once the attempt budget is spent?   | [`PassthroughErrorHandler`] |
//!
//! Each trait is also implemented for closures with the matching signature,
//! so a policy can be swapped without a new type:
//!
//! ```
//! use courier_http::client::{Outcome, RetryPolicy};
//!
//! let only_503 = |outcome: &Outcome, _attempt: u32| -> courier_http::Result<bool> {
//!     Ok(matches!(outcome, Ok(r) if r.status().as_u16() == 503))
//! };
//! # fn assert_policy(_: impl RetryPolicy) {}
//! assert_policy(only_503);
//! ```

use super::utils::{
    exponential_backoff, is_retryable_status, is_throttle_status, parse_retry_after,
};
use crate::error::{Error, Result};
use crate::response::drain;
use async_trait::async_trait;
use std::time::Duration;

/// Result of one physical attempt.
pub type Outcome = Result<reqwest::Response>;

/// Decides whether an attempt's outcome warrants another attempt.
///
/// Returning an error ends the call with that error; the executor drains any
/// response that came with the outcome.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, outcome: &Outcome, attempt: u32) -> Result<bool>;
}

impl<F> RetryPolicy for F
where
    F: Fn(&Outcome, u32) -> Result<bool> + Send + Sync,
{
    fn should_retry(&self, outcome: &Outcome, attempt: u32) -> Result<bool> {
        self(outcome, attempt)
    }
}

/// Decides how long to wait before attempt `attempt + 1`.
pub trait Backoff: Send + Sync {
    fn wait(&self, attempt: u32, min: Duration, max: Duration, outcome: &Outcome) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32, Duration, Duration, &Outcome) -> Duration + Send + Sync,
{
    fn wait(&self, attempt: u32, min: Duration, max: Duration, outcome: &Outcome) -> Duration {
        self(attempt, min, max, outcome)
    }
}

/// Maps the last outcome to the call's result once retries are exhausted.
///
/// Implementations that discard a response should drain it first.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn on_exhausted(&self, outcome: Outcome, attempts: u32) -> Outcome;
}

#[async_trait]
impl<F> ErrorHandler for F
where
    F: Fn(Outcome, u32) -> Outcome + Send + Sync,
{
    async fn on_exhausted(&self, outcome: Outcome, attempts: u32) -> Outcome {
        self(outcome, attempts)
    }
}

/// Retries transport failures, 429 and 5xx (except 501).
///
/// Builder, redirect-loop and decode errors are never retried: another
/// attempt would fail the same way.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, outcome: &Outcome, _attempt: u32) -> Result<bool> {
        let retry = match outcome {
            Ok(response) => is_retryable_status(response.status().as_u16()),
            Err(Error::Transport(e)) => {
                !(e.is_builder() || e.is_redirect() || e.is_decode() || e.is_status())
            }
            Err(_) => false,
        };
        Ok(retry)
    }
}

/// `min * 2^attempt` capped at `max`, or the server's `Retry-After` on
/// 429/503 responses clamped to `min..=max`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialBackoff;

impl Backoff for ExponentialBackoff {
    fn wait(&self, attempt: u32, min: Duration, max: Duration, outcome: &Outcome) -> Duration {
        if let Ok(response) = outcome {
            if is_throttle_status(response.status().as_u16()) {
                if let Some(delay) = parse_retry_after(response.headers()) {
                    return delay.max(min).min(max);
                }
            }
        }
        exponential_backoff(attempt, min, max)
    }
}

/// Always waits `min`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantBackoff;

impl Backoff for ConstantBackoff {
    fn wait(&self, _attempt: u32, min: Duration, _max: Duration, _outcome: &Outcome) -> Duration {
        min
    }
}

/// Returns the last outcome unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughErrorHandler;

#[async_trait]
impl ErrorHandler for PassthroughErrorHandler {
    async fn on_exhausted(&self, outcome: Outcome, _attempts: u32) -> Outcome {
        outcome
    }
}

/// Drains the last response and fails with [`Error::RetriesExhausted`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GiveUpErrorHandler;

#[async_trait]
impl ErrorHandler for GiveUpErrorHandler {
    async fn on_exhausted(&self, outcome: Outcome, attempts: u32) -> Outcome {
        if let Ok(response) = outcome {
            drain(response).await;
        }
        Err(Error::RetriesExhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: u16, retry_after: Option<&str>) -> Outcome {
        let mut builder = http::Response::builder().status(status);
        if let Some(value) = retry_after {
            builder = builder.header(http::header::RETRY_AFTER, value);
        }
        Ok(reqwest::Response::from(builder.body("").unwrap()))
    }

    #[test]
    fn test_default_policy_statuses() {
        let policy = DefaultRetryPolicy;
        assert!(policy.should_retry(&outcome(503, None), 0).unwrap());
        assert!(policy.should_retry(&outcome(429, None), 0).unwrap());
        assert!(!policy.should_retry(&outcome(501, None), 0).unwrap());
        assert!(!policy.should_retry(&outcome(200, None), 0).unwrap());
        assert!(!policy.should_retry(&outcome(404, None), 0).unwrap());
    }

    #[test]
    fn test_default_policy_skips_context_errors() {
        let policy = DefaultRetryPolicy;
        assert!(!policy.should_retry(&Err(Error::Cancelled), 0).unwrap());
        assert!(!policy.should_retry(&Err(Error::DeadlineExceeded), 0).unwrap());
    }

    #[test]
    fn test_exponential_backoff_honours_retry_after() {
        let min = Duration::from_millis(10);
        let max = Duration::from_secs(5);

        let wait = ExponentialBackoff.wait(2, min, max, &outcome(503, Some("2")));
        assert_eq!(wait, Duration::from_secs(2));

        let wait = ExponentialBackoff.wait(2, min, max, &outcome(500, Some("2")));
        assert_eq!(wait, Duration::from_millis(40));

        let wait = ExponentialBackoff.wait(30, min, max, &Err(Error::NoResponse));
        assert_eq!(wait, max);
    }

    #[test]
    fn test_retry_after_is_clamped_to_bounds() {
        let min = Duration::from_millis(100);
        let max = Duration::from_secs(10);

        let wait = ExponentialBackoff.wait(0, min, max, &outcome(503, Some("86400")));
        assert_eq!(wait, max);

        let wait = ExponentialBackoff.wait(0, min, max, &outcome(429, Some("0")));
        assert_eq!(wait, min);
    }

    #[test]
    fn test_constant_backoff() {
        let min = Duration::from_millis(25);
        let wait = ConstantBackoff.wait(7, min, Duration::from_secs(1), &outcome(503, None));
        assert_eq!(wait, min);
    }

    #[test]
    fn test_closures_as_policies() {
        let policy = |_: &Outcome, attempt: u32| -> Result<bool> { Ok(attempt < 2) };
        assert!(policy.should_retry(&outcome(200, None), 1).unwrap());
        assert!(!policy.should_retry(&outcome(200, None), 2).unwrap());

        let backoff = |attempt: u32, min: Duration, _: Duration, _: &Outcome| min * (attempt + 1);
        assert_eq!(
            backoff.wait(2, Duration::from_millis(5), Duration::ZERO, &outcome(200, None)),
            Duration::from_millis(15)
        );
    }

    #[tokio::test]
    async fn test_error_handlers() {
        let passed = PassthroughErrorHandler
            .on_exhausted(outcome(503, None), 3)
            .await
            .unwrap();
        assert_eq!(passed.status().as_u16(), 503);

        let err = GiveUpErrorHandler
            .on_exhausted(outcome(503, None), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RetriesExhausted { attempts: 3 }));

        let custom = |_: Outcome, attempts: u32| -> Outcome {
            Err(Error::Build(format!("stopped after {attempts}")))
        };
        let err = custom.on_exhausted(outcome(500, None), 6).await.unwrap_err();
        assert_eq!(err.to_string(), "failed to build request: stopped after 6");
    }
}
