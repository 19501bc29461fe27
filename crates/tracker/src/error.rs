//! Error types for tracker calls.

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors from a remote tracker call.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The tracker answered with a non-success status.
    #[error("Tracker returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// Reading a local artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The client is missing required settings.
    #[error("Tracker configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for TrackerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}
