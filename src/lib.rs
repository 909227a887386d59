//! `resilient-http` is a resilient async HTTP request client.
//!
//! The crate wraps a single request/response exchange with bounded,
//! policy-driven retries:
//! - [`HttpClient::send`] — one attempt, no retries
//! - [`HttpClient::send_with_retry`] — retry loop honoring `Retry-After`
//!   with exponential backoff fallback
//! - [`HttpClient::send_with_retry_cancellable`] — same loop, abortable
//!   through a cancellation token

mod client;
mod config;
mod error;
mod executor;
mod request;
mod retry;

pub use client::HttpClient;
pub use config::RetryConfig;
pub use error::HttpError;
pub use executor::IoErrorCode;
pub use request::RequestSpec;

pub type Result<T> = std::result::Result<T, HttpError>;
