//! Error types for search-chat

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for a chat turn
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error (connection refused, reset mid-stream, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing streamed text to the output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The server answered with a non-success status. Carries the body verbatim.
    #[error("API request failed: {status} {body}")]
    Transport { status: u16, body: String },

    /// A single `data: ` line could not be parsed. Logged and skipped by the
    /// decoder, never returned from a turn.
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The accumulated tool-call arguments are not valid capability input
    #[error("Malformed tool arguments: {0}")]
    MalformedToolArguments(String),

    /// The turn's cancellation token was signalled
    #[error("Request cancelled")]
    Cancelled,

    /// The per-turn deadline elapsed
    #[error("Turn timed out")]
    Timeout,

    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl Error {
    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a transport error from a status code and response body
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Error::Transport {
            status,
            body: body.into(),
        }
    }

    /// Create a malformed frame error
    pub fn malformed_frame(msg: impl Into<String>) -> Self {
        Error::MalformedFrame(msg.into())
    }

    /// Create a malformed tool arguments error
    pub fn malformed_tool_arguments(msg: impl Into<String>) -> Self {
        Error::MalformedToolArguments(msg.into())
    }

    /// Create a new other error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// True when the error is the quiet unwind of a superseded turn
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
