use std::time::{Duration, SystemTime};

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::{config::RetryConfig, executor::AttemptFailure};

/// Verdict for an attempt that just failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Wait for the given delay, then try again.
    Retry { delay: Duration },
    /// The failure is terminal.
    GiveUp,
}

/// Checks whether a failed attempt is eligible for a retry.
///
/// `attempt` is the number of retries completed so far (0 on the first
/// failure). Response-carrying failures are matched against the policy's
/// status codes, connectivity failures against its transport codes.
pub(crate) fn is_retry_eligible(
    config: &RetryConfig,
    attempt: u32,
    failure: &AttemptFailure,
) -> bool {
    if attempt >= config.max_retries {
        return false;
    }
    match failure {
        AttemptFailure::Response { status, .. } => config.status_codes.contains(&status.as_u16()),
        AttemptFailure::Transport { code, .. } => config.io_error_codes.contains(code),
    }
}

/// Decides whether to retry and how long to wait first.
///
/// A strictly positive `Retry-After` header takes precedence over backoff
/// and is returned as-is — it may exceed `max_delay_ms`, and the caller
/// enforces that ceiling.
pub(crate) fn retry_delay(
    config: &RetryConfig,
    attempt: u32,
    failure: &AttemptFailure,
) -> RetryDecision {
    if !is_retry_eligible(config, attempt, failure) {
        return RetryDecision::GiveUp;
    }

    if let AttemptFailure::Response { headers, .. } = failure {
        if let Some(delay) = positive_retry_after(headers) {
            return RetryDecision::Retry { delay };
        }
    }

    RetryDecision::Retry {
        delay: back_off_delay(config, attempt),
    }
}

/// Parses the `Retry-After` header into a strictly positive delay.
///
/// The value is either a count of whole seconds or an HTTP date. Returns
/// `None` when the header is absent, malformed, or names a moment that has
/// already passed; the scheduler then falls back to backoff.
fn positive_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(seconds) = raw.parse::<i64>() {
        if seconds > 0 {
            return Some(Duration::from_secs(seconds as u64));
        }
        return None;
    }

    let target = httpdate::parse_http_date(raw).ok()?;
    target
        .duration_since(SystemTime::now())
        .ok()
        .filter(|delay| !delay.is_zero())
}

/// Exponential backoff: `(2^attempt) * back_off_factor` seconds, capped at
/// `max_delay_ms`. Attempt 0 retries immediately.
pub(crate) fn back_off_delay(config: &RetryConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    // f64 math: past ~2^1024 the product saturates to infinity and the cap
    // below still applies.
    let delay_ms = 2f64.powi(attempt.min(1_024) as i32) * config.back_off_factor * 1000.0;
    Duration::from_millis(delay_ms.min(config.max_delay_ms as f64) as u64)
}
