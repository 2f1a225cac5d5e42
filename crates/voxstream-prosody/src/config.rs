use serde::{Deserialize, Serialize};

use voxstream_foundation::{ConfigError, Validate};

/// Crossfade and retime limits. Hot-reloadable.
///
/// The one-retime-per-sentence and ~120ms window defaults are tuned values,
/// not physical constants; both are expected calibration targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeConfig {
    /// Crossfade length, capped at half the original segment (ms)
    pub crossfade_ms: u64,
    /// Corrections allowed per sentence
    pub max_retimes_per_sentence: u32,
    /// How long after registration a segment may still be corrected (ms)
    pub retime_threshold_ms: u64,
}

impl Default for CrossfadeConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: 30,
            max_retimes_per_sentence: 1,
            retime_threshold_ms: 120,
        }
    }
}

impl Validate for CrossfadeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.crossfade_ms == 0 {
            return Err(ConfigError::invalid("crossfade_ms", "must be > 0"));
        }
        if self.retime_threshold_ms == 0 {
            return Err(ConfigError::invalid("retime_threshold_ms", "must be > 0"));
        }
        Ok(())
    }
}
