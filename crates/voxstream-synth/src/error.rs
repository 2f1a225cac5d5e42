//! Error types for synthesis

use thiserror::Error;

/// Synthesis error types
#[derive(Error, Debug)]
pub enum SynthError {
    /// The engine cannot produce audio at all; fatal for the session
    #[error("synthesis engine not available: {0}")]
    EngineNotAvailable(String),

    /// One request failed; the pipeline retries and then degrades
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),

    /// The request itself was unusable
    #[error("invalid text input: {0}")]
    InvalidInput(String),

    /// The engine did not answer in time
    #[error("synthesis timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SynthError {
    /// Whether this failure means the engine is gone for good, as opposed to
    /// one bad request.
    pub fn is_unavailability(&self) -> bool {
        matches!(self, SynthError::EngineNotAvailable(_))
    }
}

/// Result type for synthesis operations
pub type SynthResult<T> = Result<T, SynthError>;
