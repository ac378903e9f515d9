//! Error handling module for reelgen

use thiserror::Error;

use crate::domain::errors::DomainError;

/// Main error type for reelgen operations
#[derive(Error, Debug)]
pub enum ReelgenError {
    /// Configuration file, environment or flag problem
    #[error("Configuration error: {0}")]
    Config(String),

    /// Composition file could not be read or parsed
    #[error("Failed to load composition {path}: {message}")]
    CompositionParse { path: String, message: String },

    /// Failure reported by the rendering domain
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for reelgen operations
pub type ReelgenResult<T> = std::result::Result<T, ReelgenError>;
