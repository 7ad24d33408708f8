//! Error types for tabtalk

use thiserror::Error;

/// Main error type for tabtalk operations.
///
/// Only failures that abort an agent run live here. Tool-level failures
/// (unknown tool, bad arguments, executor errors) are absorbed into the
/// transcript as tool-result strings and never surface as an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// The completion endpoint answered with a non-2xx status.
    #[error("completion endpoint returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// The request never produced an HTTP response.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The completion response is missing expected fields or carries
    /// tool-call arguments that do not parse.
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),

    /// The run was aborted through its cancellation token.
    #[error("run cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a transport error from a status code and response body
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Error::Transport {
            status,
            body: body.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedResponse(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// True for errors that abort a run because of the completion
    /// endpoint (as opposed to local misconfiguration).
    pub fn is_endpoint_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::Http(_) | Error::MalformedResponse(_)
        )
    }
}
