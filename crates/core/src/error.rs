//! Error types for deck extraction.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting a deck.
///
/// Shape mismatches inside slides are not errors; they are reported as
/// [`crate::Skip`] entries alongside the parsed records.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to read or write a file.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The external page renderer failed.
    #[error("Render error: {0}")]
    RenderError(String),

    /// The text-generation collaborator failed.
    #[error("Describe error: {0}")]
    DescribeError(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
