//! Utility functions for the retry engine.
//!
//! This module provides helpers for:
//! - Status code classification
//! - Exponential backoff arithmetic
//! - `Retry-After` header parsing
//!
//! # Specification
//!
//! `Retry-After` handling follows RFC 9110 §10.2.3 (delay-seconds form only).

use http::header::RETRY_AFTER;
use http::HeaderMap;
use std::time::Duration;

/// Check if status code indicates a retryable error
///
/// 429 and every 5xx except 501 (Not Implemented) are retried.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || ((500..=599).contains(&status) && status != 501)
}

/// Check if status code asks the client to come back later
pub fn is_throttle_status(status: u16) -> bool {
    matches!(status, 429 | 503)
}

/// Exponential backoff delay calculation
///
/// Returns `min * 2^attempt`, capped at `max`.
pub fn exponential_backoff(attempt: u32, min: Duration, max: Duration) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| min.checked_mul(factor))
        .map_or(max, |delay| delay.min(max))
}

/// Parse a `Retry-After` header given in seconds.
///
/// HTTP-date values are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
