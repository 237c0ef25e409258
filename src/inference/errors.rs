//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's job; these types carry the context needed to build
//! meaningful log entries. The planning core never inspects the variant: any
//! `InferenceError` is a model-call failure and maps to a fallback.

use thiserror::Error;

/// Errors that can occur while calling the model endpoint.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body was not a valid chat completion.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// The completion carried no message content.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// Every attempt allowed by the retry policy failed.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<InferenceError>,
    },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl InferenceError {
    /// Whether a fresh attempt against the same endpoint might succeed.
    ///
    /// 429 and 5xx are transient on hosted endpoints. 4xx other than 429
    /// means the request itself is wrong and retrying will not help.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            InferenceError::ConnectionFailed { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::EmptyResponse
                | InferenceError::HttpError { status: 429, .. }
                | InferenceError::HttpError {
                    status: 500..=599,
                    ..
                }
        )
    }
}
