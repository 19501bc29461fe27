//! Pipeline error type.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failures that end a pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The request was malformed; nothing was processed.
    #[error("{0}")]
    Input(String),

    /// Extraction, rendering or description failed.
    #[error(transparent)]
    Extraction(#[from] deck_core::Error),

    /// The tracker could not be read.
    #[error(transparent)]
    Tracker(#[from] deck_tracker::TrackerError),

    /// Scratch directory handling failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
