// src/config.rs - TOML run configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{CoverError, Result};
use crate::uncertain::UFloat;
use crate::validation::{
    validate_inputs, ProcessOptions, DEFAULT_DOWN_FACTOR, DEFAULT_K_NOMINAL, DEFAULT_K_STD_DEV,
};

/// Configuration for one canopy cover run
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the photographs
    #[serde(default = "default_input_path")]
    pub input_path: String,

    // Extinction coefficient and its standard uncertainty
    #[serde(default = "default_k_nominal")]
    pub k_nominal: f64,

    #[serde(default = "default_k_std_dev")]
    pub k_std_dev: f64,

    /// "up" or "down"; kept as text so bad values surface as invalid arguments
    #[serde(default = "default_direction")]
    pub direction: String,

    #[serde(default = "default_down_factor")]
    pub down_factor: i64,

    #[serde(default = "default_pre_process_raw")]
    pub pre_process_raw: bool,

    #[serde(default)]
    pub save_bin_img: bool,

    /// Write the indices as JSON to this path
    #[serde(default)]
    pub output_json: Option<String>,

    /// Write per-image statistics as CSV to this path
    #[serde(default)]
    pub output_csv: Option<String>,
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_k_nominal() -> f64 {
    DEFAULT_K_NOMINAL
}

fn default_k_std_dev() -> f64 {
    DEFAULT_K_STD_DEV
}

fn default_direction() -> String {
    "up".to_string()
}

fn default_down_factor() -> i64 {
    DEFAULT_DOWN_FACTOR
}

fn default_pre_process_raw() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            k_nominal: DEFAULT_K_NOMINAL,
            k_std_dev: DEFAULT_K_STD_DEV,
            direction: default_direction(),
            down_factor: DEFAULT_DOWN_FACTOR,
            pre_process_raw: true,
            save_bin_img: false,
            output_json: None,
            output_csv: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CoverError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            CoverError::Config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// The extinction coefficient as an uncertain value
    pub fn k(&self) -> UFloat {
        UFloat::new(self.k_nominal, self.k_std_dev)
    }

    /// Validate the run parameters and convert them to [`ProcessOptions`]
    pub fn to_options(&self) -> Result<ProcessOptions> {
        if self.k_std_dev < 0.0 {
            return Err(CoverError::InvalidArgument(format!(
                "k standard uncertainty must be non-negative, got {}",
                self.k_std_dev
            )));
        }
        validate_inputs(
            &self.input_path,
            &self.k(),
            &self.direction,
            self.down_factor,
            self.pre_process_raw,
            self.save_bin_img,
        )
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            CoverError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}
