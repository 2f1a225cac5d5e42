//! Top-level pipeline configuration, loadable from TOML and hot-swappable
//! section by section at runtime.

use std::path::Path;

use serde::{Deserialize, Serialize};

use voxstream_control::ControlConfig;
use voxstream_foundation::{ConfigError, Validate};
use voxstream_prosody::CrossfadeConfig;
use voxstream_text::ChunkingConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub control: ControlConfig,
    pub crossfade: CrossfadeConfig,
}

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;
        self.control.validate()?;
        self.crossfade.validate()?;
        Ok(())
    }
}

/// Loads and validates a TOML configuration file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let config: PipelineConfig =
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[chunking]\nchunk_token_budget = 32\n\n[crossfade]\ncrossfade_ms = 40"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.chunking.chunk_token_budget, 32);
        assert_eq!(config.crossfade.crossfade_ms, 40);
        // Untouched sections keep their defaults.
        assert_eq!(
            config.control.neutral_token_budget,
            ControlConfig::default().neutral_token_budget
        );
    }

    #[test]
    fn invalid_values_are_rejected_at_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[chunking]\nchunk_token_budget = 0").unwrap();
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml at all [[[").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
