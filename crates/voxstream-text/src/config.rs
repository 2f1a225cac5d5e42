use serde::{Deserialize, Serialize};

use voxstream_foundation::{ConfigError, Validate};

/// Chunking parameters. Hot-reloadable; applied to future decisions only.
///
/// Budgets count one token per character of pending text, the only unit that
/// is stable no matter how the upstream generator fragments its output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Slack past the budget before a flush is forced (tokens)
    pub lookahead_tokens: usize,
    /// Initial chunk size target; the controller adapts it at runtime
    pub chunk_token_budget: usize,
    /// Floor below which hard punctuation does not flush (tokens)
    pub min_flush_tokens: usize,
    /// Soft deadline: once elapsed, flush at the newest buffered boundary (ms)
    pub time_budget_ms: u64,
    /// Unconditional flush deadline for slow, punctuation-free input (ms)
    pub force_flush_timeout_ms: u64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            lookahead_tokens: 12,
            chunk_token_budget: 48,
            min_flush_tokens: 2,
            time_budget_ms: 150,
            force_flush_timeout_ms: 250,
        }
    }
}

impl Validate for ChunkingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_token_budget == 0 {
            return Err(ConfigError::invalid("chunk_token_budget", "must be > 0"));
        }
        if self.min_flush_tokens == 0 {
            return Err(ConfigError::invalid("min_flush_tokens", "must be >= 1"));
        }
        if self.time_budget_ms == 0 {
            return Err(ConfigError::invalid("time_budget_ms", "must be > 0"));
        }
        if self.force_flush_timeout_ms == 0 {
            return Err(ConfigError::invalid("force_flush_timeout_ms", "must be > 0"));
        }
        Ok(())
    }
}
