//! Error types for the HTTP adapters

use goldminer_core::retry::RetryError;
use goldminer_core::{CancelCause, PortError};
use thiserror::Error;

/// Errors raised while talking to GitHub, Gemini or Feishu
#[derive(Error, Debug)]
pub enum AdapterError {
    /// A required setting is missing
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Transport-level failure (connect, TLS, timeout, body read)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The remote answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body arrived but did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The remote accepted the request but refused it at the application level
    #[error("rejected: {0}")]
    Rejected(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("request interrupted: {0}")]
    Cancelled(CancelCause),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Http(err.to_string())
    }
}

impl From<AdapterError> for PortError {
    fn from(err: AdapterError) -> Self {
        match err {
            AdapterError::Cancelled(cause) => PortError::Cancelled(cause),
            AdapterError::Http(_) | AdapterError::Status { .. } => {
                PortError::Unavailable(err.to_string())
            }
            AdapterError::NotConfigured(_) => PortError::Unavailable(err.to_string()),
            AdapterError::Decode(_)
            | AdapterError::Rejected(_)
            | AdapterError::Json(_)
            | AdapterError::Url(_) => PortError::InvalidResponse(err.to_string()),
        }
    }
}

/// Collapse a retried call's failure into a port error.
///
/// Cancellation keeps its cause; exhaustion keeps the attempt count in the message.
pub(crate) fn from_retry(err: RetryError<AdapterError>) -> PortError {
    match err.cancel_cause() {
        Some(cause) => PortError::Cancelled(cause),
        None => PortError::Unavailable(err.to_string()),
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
