//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while turning a transcript into screenshots
#[derive(Error, Debug)]
pub enum Error {
    /// The request is missing a field or has the wrong shape
    #[error("{0}")]
    Validation(String),

    /// The rendering surface failed to start, load the document or stabilize
    #[error("Rendering failed: {0}")]
    Render(String),

    /// The full-height capture could not be produced
    #[error("Capture failed: {0}")]
    Capture(String),

    /// A single chunk could not be extracted or written
    #[error("Error slicing chunk {index}: {reason}")]
    Slice { index: usize, reason: String },

    /// The session storage location could not be created
    #[error("Storage unavailable: {0}")]
    Resource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Whether the failure was caused by the caller's input rather than the pipeline.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// HTTP status used when reporting this error over the API boundary.
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}
