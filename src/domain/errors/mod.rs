// Domain errors - Error taxonomy for compositions, render jobs and publishing

use std::fmt;

/// Domain-specific error types
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Caller error, rejected before any subprocess is spawned
    CompositionInvalid(String),
    /// Encoding engine failed or produced no usable artifact
    RenderFailed(String),
    /// Storage transport or auth error after a successful render
    PublishFailed(String),
    /// Status query for an unknown identifier
    JobNotFound(String),
    /// Configured deadline exceeded (a render failure subtype)
    Timeout(String),
    /// Encoding engine could not be started
    EngineUnavailable(String),
    /// Local file system error
    Io(String),
}

impl DomainError {
    /// Whether the error belongs to the render stage
    pub fn is_render_failure(&self) -> bool {
        matches!(
            self,
            DomainError::RenderFailed(_) | DomainError::Timeout(_) | DomainError::EngineUnavailable(_)
        )
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::CompositionInvalid(msg) => write!(f, "Composition invalid: {}", msg),
            DomainError::RenderFailed(msg) => write!(f, "Render failed: {}", msg),
            DomainError::PublishFailed(msg) => write!(f, "Publish failed: {}", msg),
            DomainError::JobNotFound(id) => write!(f, "Job not found: {}", id),
            DomainError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            DomainError::EngineUnavailable(msg) => write!(f, "Encoding engine unavailable: {}", msg),
            DomainError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<std::io::Error> for DomainError {
    fn from(e: std::io::Error) -> Self {
        DomainError::Io(e.to_string())
    }
}
