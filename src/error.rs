//! Error types for the render service

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering a panel
#[derive(Error, Debug)]
pub enum Error {
    /// No markup file exists for the requested template name
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Markup expansion failed (syntax error, undefined reference, ...)
    #[error("Template render failed: {0}")]
    TemplateRender(String),

    /// The browser process failed or produced no usable output
    #[error("Rasterization failed: {0}")]
    Rasterization(String),

    /// The browser process exceeded its wall-clock bound
    #[error("Browser timed out after {0}ms")]
    Timeout(u64),

    /// A temporary file could not be created or written
    #[error("Temp file I/O failed: {0}")]
    TempFile(String),

    /// The template directory is missing or unreadable
    #[error("Template store unavailable: {0}")]
    Store(String),

    /// The delivery surface failed to start
    #[error("Server error: {0}")]
    Server(String),
}
