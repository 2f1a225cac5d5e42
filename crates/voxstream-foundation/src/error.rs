use thiserror::Error;

use crate::config::ConfigError;

/// Top-level pipeline error.
///
/// Component failures stay local and degrade gracefully; only total engine
/// unavailability is fatal to a session.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    #[error("synthesis engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("session failed: {0}")]
    SessionFailed(String),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("shutdown requested")]
    ShutdownRequested,
}

/// How a session should react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Keep running; the pipeline substitutes degraded output.
    Degraded,
    /// The session cannot produce audio at all.
    Fatal,
}

impl PipelineError {
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::EngineUnavailable(_) => Severity::Fatal,
            PipelineError::SessionFailed(_) => Severity::Fatal,
            PipelineError::ShutdownRequested => Severity::Fatal,
            PipelineError::Config(_) | PipelineError::ChannelClosed(_) => Severity::Degraded,
        }
    }
}
