use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{
    executor::{self, AttemptFailure, IoErrorCode},
    retry::{retry_delay, RetryDecision},
    HttpError, RequestSpec, Result, RetryConfig,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Resilient HTTP client.
///
/// Sends a [`RequestSpec`] to a remote server and deserializes the JSON
/// response body. [`send`](HttpClient::send) performs a single attempt;
/// [`send_with_retry`](HttpClient::send_with_retry) retries failures the
/// policy marks eligible, honoring `Retry-After` and falling back to
/// exponential backoff.
///
/// # Example
///
/// ```no_run
/// use resilient_http::{HttpClient, RequestSpec};
///
/// # async fn run() -> resilient_http::Result<()> {
/// let client = HttpClient::default();
/// let spec = RequestSpec::get("https://svc.example.com/people");
/// let people: serde_json::Value = client.send_with_retry(&spec).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    http: reqwest::Client,
    retry: RetryConfig,
    timeout: Duration,
}

/// Ephemeral per-call state; dropped when the call resolves.
struct AttemptState {
    /// Retries completed so far (0 while the first attempt is in flight).
    attempt: u32,
    /// When the logical call began.
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    started: Instant,
}

impl Default for HttpClient {
    /// A client with the default retry policy and a 10 s per-attempt
    /// timeout.
    fn default() -> Self {
        Self {
            http: reqwest::Client::new(),
            retry: RetryConfig::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl HttpClient {
    /// Creates a client with the given retry policy.
    ///
    /// The policy is validated here, once; an invalid policy is a fatal
    /// configuration error, never a per-request failure.
    pub fn new(retry: RetryConfig) -> Result<Self> {
        retry.validate()?;
        Ok(Self {
            http: reqwest::Client::new(),
            retry,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the request once, with no retries.
    ///
    /// On a 2xx response the body is deserialized into `T`. A non-2xx
    /// response surfaces as [`HttpError::Response`]; a connectivity failure
    /// as [`HttpError::Timeout`] or [`HttpError::Transport`].
    pub async fn send<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T> {
        match executor::execute(&self.http, spec, self.timeout).await {
            Ok(body) => decode_body(&body),
            Err(failure) => Err(terminal_error(failure)),
        }
    }

    /// Sends the request, retrying failures the policy marks eligible.
    ///
    /// Attempts run strictly one after another; the wait between them is a
    /// plain timer suspension, so independent calls sharing the runtime
    /// proceed unimpeded. The loop ends on success, on an ineligible
    /// failure, or when the scheduled delay exceeds the policy ceiling
    /// ([`HttpError::RetryBudgetExceeded`]).
    pub async fn send_with_retry<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T> {
        self.send_with_retry_cancellable(spec, &CancellationToken::new())
            .await
    }

    /// Same as [`send_with_retry`](HttpClient::send_with_retry), aborting
    /// with [`HttpError::Cancelled`] as soon as `cancel` fires — whether
    /// the call is mid-attempt or mid-wait.
    pub async fn send_with_retry_cancellable<T: DeserializeOwned>(
        &self,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let mut state = AttemptState {
            attempt: 0,
            started: Instant::now(),
        };

        loop {
            let outcome = tokio::select! {
                outcome = executor::execute(&self.http, spec, self.timeout) => outcome,
                _ = cancel.cancelled() => return Err(HttpError::Cancelled),
            };

            let failure = match outcome {
                Ok(body) => return decode_body(&body),
                Err(failure) => failure,
            };

            let delay = match retry_delay(&self.retry, state.attempt, &failure) {
                RetryDecision::Retry { delay } => delay,
                RetryDecision::GiveUp => return Err(terminal_error(failure)),
            };

            let max_delay = Duration::from_millis(self.retry.max_delay_ms);
            if delay > max_delay {
                return Err(HttpError::RetryBudgetExceeded {
                    delay,
                    max_delay,
                    last: Box::new(terminal_error(failure)),
                });
            }

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt = state.attempt,
                delay_ms = delay.as_millis() as u64,
                elapsed_ms = state.started.elapsed().as_millis() as u64,
                "retrying request"
            );

            wait_for_retry(delay, cancel).await?;
            state.attempt += 1;
        }
    }
}

/// Pure timer suspension between attempts.
///
/// A zero delay resolves immediately without touching the timer at all.
async fn wait_for_retry(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        _ = sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(HttpError::Cancelled),
    }
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    // DELETE and 204-style endpoints legitimately return nothing; treat an
    // empty body as JSON null so `Option<T>` and `()` callers see absence
    // rather than a parse error.
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|err| {
        HttpError::Decode(format!("invalid response body JSON: {err}; body: {body}"))
    })
}

/// Maps the last attempt's failure onto the public error surface.
fn terminal_error(failure: AttemptFailure) -> HttpError {
    match failure {
        AttemptFailure::Response {
            status,
            headers,
            body,
        } => HttpError::Response {
            status: status.as_u16(),
            headers,
            body,
        },
        AttemptFailure::Transport {
            code: IoErrorCode::TimedOut,
            source,
        } => HttpError::Timeout { source },
        AttemptFailure::Transport { code, source } => HttpError::Transport { code, source },
    }
}
