use serde::{Deserialize, Serialize};

use voxstream_foundation::{ConfigError, Validate};

/// Watermark policy for the backpressure controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Buffer depth below which the budget steps down (ms)
    pub low_watermark_ms: u64,
    /// Buffer depth above which the budget steps up (ms)
    pub high_watermark_ms: u64,
    /// Budget change per observation (tokens)
    pub step_tokens: usize,
    /// Smallest budget the controller will set
    pub min_token_budget: usize,
    /// Largest budget the controller will set
    pub max_token_budget: usize,
    /// Budget restored when telemetry goes stale
    pub neutral_token_budget: usize,
    /// Telemetry older than this reverts the budget to neutral (ms)
    pub stale_after_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            low_watermark_ms: 500,
            high_watermark_ms: 1500,
            step_tokens: 16,
            min_token_budget: 16,
            max_token_budget: 160,
            neutral_token_budget: 48,
            stale_after_ms: 750,
        }
    }
}

impl Validate for ControlConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.low_watermark_ms >= self.high_watermark_ms {
            return Err(ConfigError::invalid(
                "low_watermark_ms",
                format!(
                    "must be below high_watermark_ms ({} >= {})",
                    self.low_watermark_ms, self.high_watermark_ms
                ),
            ));
        }
        if self.step_tokens == 0 {
            return Err(ConfigError::invalid("step_tokens", "must be > 0"));
        }
        if self.min_token_budget == 0 {
            return Err(ConfigError::invalid("min_token_budget", "must be > 0"));
        }
        if self.min_token_budget > self.max_token_budget {
            return Err(ConfigError::invalid(
                "min_token_budget",
                format!(
                    "must not exceed max_token_budget ({} > {})",
                    self.min_token_budget, self.max_token_budget
                ),
            ));
        }
        if self.neutral_token_budget < self.min_token_budget
            || self.neutral_token_budget > self.max_token_budget
        {
            return Err(ConfigError::invalid(
                "neutral_token_budget",
                "must lie within [min_token_budget, max_token_budget]",
            ));
        }
        if self.stale_after_ms == 0 {
            return Err(ConfigError::invalid("stale_after_ms", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ControlConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_watermarks_rejected() {
        let cfg = ControlConfig {
            low_watermark_ms: 2000,
            high_watermark_ms: 500,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn neutral_outside_band_rejected() {
        let cfg = ControlConfig {
            neutral_token_budget: 4,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
