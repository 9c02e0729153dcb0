//! Error type definitions for the M3U curator.
//!
//! Parse failures are fatal for the playlist they occur in: a file whose
//! first content is not the playlist marker yields no partial result.
//! Everything downstream of parsing (probing, persistence) is best-effort
//! and reports through logging instead of these types.

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Playlist parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors while writing playlist output
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Playlist parsing specific errors
#[derive(Error, Debug)]
pub enum ParseError {
    /// Content appeared before the mandatory `#EXTM3U` marker
    #[error("invalid file type with first line: {line}")]
    InvalidMarker { line: String },
}

impl AppError {
    /// Create a configuration error with a custom message
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
