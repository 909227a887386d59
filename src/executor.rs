use std::fmt;
use std::time::Duration;

use reqwest::{header::HeaderMap, StatusCode};

use crate::request::RequestSpec;

/// Identifies a transport failure below the HTTP semantic layer.
///
/// These are the codes retry policies match on via
/// [`RetryConfig::io_error_codes`](crate::RetryConfig::io_error_codes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IoErrorCode {
    /// The peer reset or aborted the connection mid-exchange.
    ConnectionReset,
    /// The connect, read, or overall request deadline expired.
    TimedOut,
    /// The connection could not be established at all (refused,
    /// unreachable, DNS failure).
    ConnectFailed,
    /// Any other transport-level failure.
    Other,
}

impl fmt::Display for IoErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConnectionReset => "connection reset",
            Self::TimedOut => "timed out",
            Self::ConnectFailed => "connect failed",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Outcome of one failed attempt, before any retry decision is made.
///
/// The two arms drive retry eligibility: a response-carrying failure is
/// matched against the policy's status codes, a connectivity failure
/// against its transport codes.
#[derive(Debug)]
pub(crate) enum AttemptFailure {
    /// The transport received a response with a non-success status.
    Response {
        status: StatusCode,
        headers: HeaderMap,
        body: String,
    },
    /// No response was received.
    Transport {
        code: IoErrorCode,
        source: reqwest::Error,
    },
}

/// Performs exactly one network attempt for `spec`.
///
/// On a success status the raw body text is returned; deserialization is
/// the caller's concern. Makes no retry decisions.
pub(crate) async fn execute(
    http: &reqwest::Client,
    spec: &RequestSpec,
    timeout: Duration,
) -> Result<String, AttemptFailure> {
    let mut request = http
        .request(spec.method().clone(), spec.url())
        .timeout(timeout);
    if !spec.query_pairs().is_empty() {
        request = request.query(spec.query_pairs());
    }
    if !spec.headers().is_empty() {
        request = request.headers(spec.headers().clone());
    }
    if let Some(body) = spec.body() {
        request = request.json(body);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => return Err(transport_failure(err)),
    };

    let status = response.status();
    let headers = response.headers().clone();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) => return Err(transport_failure(err)),
    };

    if !status.is_success() {
        return Err(AttemptFailure::Response {
            status,
            headers,
            body,
        });
    }
    Ok(body)
}

fn transport_failure(err: reqwest::Error) -> AttemptFailure {
    AttemptFailure::Transport {
        code: classify_transport_error(&err),
        source: err,
    }
}

/// Maps a `reqwest` error onto an [`IoErrorCode`].
///
/// `reqwest` does not expose OS error codes directly, so after its own
/// timeout/connect predicates this walks the source chain looking for the
/// underlying `std::io::Error` kind.
pub(crate) fn classify_transport_error(err: &reqwest::Error) -> IoErrorCode {
    if err.is_timeout() {
        return IoErrorCode::TimedOut;
    }

    if let Some(kind) = io_error_kind(err) {
        match kind {
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => return IoErrorCode::ConnectionReset,
            std::io::ErrorKind::TimedOut => return IoErrorCode::TimedOut,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::NotConnected
            | std::io::ErrorKind::AddrNotAvailable => return IoErrorCode::ConnectFailed,
            _ => {}
        }
    }

    if err.is_connect() {
        return IoErrorCode::ConnectFailed;
    }
    IoErrorCode::Other
}

fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = cause.source();
    }
    None
}
