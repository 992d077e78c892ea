//! Error types for the chat session and its collaborators.

use thiserror::Error;

/// Failure to reach the endpoint or to keep reading its body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The endpoint answered with a non-success status. The body is not read.
    #[error("endpoint returned status {0}")]
    Status(u16),

    /// The request could not be sent or the response headers never arrived.
    #[error("request failed: {0}")]
    Request(String),

    /// The body stream broke after it was opened.
    #[error("stream read failed: {0}")]
    Stream(String),
}

/// A single `data: ` line whose payload is not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JSON in stream line: {message} (data: {payload})")]
pub struct LineParseError {
    pub payload: String,
    pub message: String,
}

/// Why a `submit` call was turned away before touching the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("a response is still streaming")]
    Busy,

    #[error("session has been closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
