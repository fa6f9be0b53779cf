//! Error types for the comparison engine

use thiserror::Error;

/// Result type alias for comparison operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a page comparison
#[derive(Error, Debug)]
pub enum Error {
    /// The renderer collaborator could not produce a capture
    #[error("Render failed: {0}")]
    Render(String),

    /// A screenshot file exceeded the decode size cap
    #[error("Screenshot too large: {0}")]
    SizeLimit(String),

    /// A screenshot file could not be decoded as PNG
    #[error("Image decode failed: {0}")]
    Decode(String),

    /// The isolated comparison worker exited non-zero, timed out, or
    /// produced unparseable output
    #[error("Comparison worker failed: {0}")]
    Worker(String),

    /// Writing a comparison artifact failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing a report artifact failed
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}
