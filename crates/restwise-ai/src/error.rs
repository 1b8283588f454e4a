use thiserror::Error;

/// Failures of the advisory collaborator. All of them are recoverable: callers
/// fall back to their deterministic path.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor unavailable: {0}")]
    Unavailable(String),

    #[error("advisor timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("advisor response malformed: {0}")]
    Malformed(String),
}
