/// Configuration - TOML file layered over built-in defaults
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::sequencer::clock::Timing;
use crate::sequencer::DEFAULT_STEP_SECONDS;

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub timing: Timing,
    pub surface: SurfaceConfig,
    pub song: SongConfig,
    pub click: ClickConfig,
    pub trigger: TriggerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Knob sensitivity relative to the slider when mapping lanes to CV
    pub knob_radix: f32,
    /// Knob weight in tempo-set mode
    pub knob_mag: f32,
    pub input_port: String,
    pub output_port: String,
    pub channel: u8,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            knob_radix: 8.0,
            knob_mag: 1.0,
            input_port: "nanoKONTROL2".to_string(),
            output_port: "nanoKONTROL2".to_string(),
            channel: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SongConfig {
    pub default_step_seconds: f64,
    pub slot: u8,
}

impl Default for SongConfig {
    fn default() -> Self {
        Self {
            default_step_seconds: DEFAULT_STEP_SECONDS,
            slot: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    pub length_samples: u32,
    pub amplitude: f32,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            length_samples: 32,
            amplitude: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub length_blocks: u32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self { length_blocks: 4 }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read `path` if given. A missing or malformed file is logged and the
    /// defaults are used instead.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!(target: "config", "cannot read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match Self::from_toml(&text) {
            Ok(config) => {
                log::info!(target: "config", "loaded {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = Config::from_toml("[timing]\nblock_size = 128\n[surface]\nknob_mag = 4.0\n").unwrap();
        assert_eq!(config.timing.block_size, 128);
        assert_eq!(config.timing.sample_rate, 48_000);
        assert_eq!(config.surface.knob_mag, 4.0);
        assert_eq!(config.surface.input_port, "nanoKONTROL2");
        assert_eq!(config.trigger.length_blocks, 4);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = Config::from_toml(include_str!("../config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(Config::from_toml("[timing]\nblock_size = \"big\"\n").is_err());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load(Some(Path::new("/nonexistent/kontrol-seq.toml")));
        assert_eq!(config, Config::default());
    }
}
