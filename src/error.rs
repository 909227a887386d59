use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::executor::IoErrorCode;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Invalid retry configuration, raised once at client construction.
    #[error("invalid retry configuration: {0}")]
    Configuration(String),
    /// Upstream responded with a non-success HTTP status.
    #[error("http error {status}: {body}")]
    Response {
        /// HTTP status code of the response.
        status: u16,
        /// Response headers as received.
        headers: HeaderMap,
        /// Raw response body text.
        body: String,
    },
    /// The request timed out before any response arrived.
    #[error("timed out while making request: {source}")]
    Timeout {
        #[source]
        source: reqwest::Error,
    },
    /// No response was received for a reason other than a timeout.
    #[error("error while making request: {source} (error code: {code})")]
    Transport {
        /// Classified transport failure.
        code: IoErrorCode,
        #[source]
        source: reqwest::Error,
    },
    /// The failure was retry-eligible but the scheduled wait exceeds the
    /// configured ceiling.
    #[error(
        "retry delay of {} ms exceeds the {} ms ceiling: {}",
        .delay.as_millis(),
        .max_delay.as_millis(),
        .last
    )]
    RetryBudgetExceeded {
        /// Delay the scheduler asked for (from `Retry-After` or backoff).
        delay: Duration,
        /// Configured `max_delay_ms` ceiling.
        max_delay: Duration,
        /// The attempt failure that triggered the over-budget retry.
        #[source]
        last: Box<HttpError>,
    },
    /// A success response carried a body that could not be deserialized.
    #[error("decode error: {0}")]
    Decode(String),
    /// The caller cancelled the request mid-attempt or mid-wait.
    #[error("request cancelled")]
    Cancelled,
}

impl HttpError {
    /// HTTP status code associated with this error, where one exists.
    ///
    /// Useful for layers that map failures onto their own transport-facing
    /// error codes.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::RetryBudgetExceeded { last, .. } => last.status(),
            _ => None,
        }
    }
}
