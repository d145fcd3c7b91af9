//! Error types for confab-proto

use thiserror::Error;

/// Result type alias using confab-proto Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the storage/agent collaborator
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The RPC endpoint returned an error response
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Server-sent events error
    #[error("SSE error: {0}")]
    Sse(String),

    /// The requested resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The configured base URL could not be parsed
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// Unexpected response format
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl Error {
    /// Create an RPC error from code and message
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }
}
