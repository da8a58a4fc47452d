//! Run configuration, read from an optional TOML file and overridden by CLI flags.

use crate::clean::CleaningConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Location of the sale records.
    pub data_path: PathBuf,
    /// Directory receiving the report, plot data, metrics and model files.
    pub output_dir: PathBuf,
    pub train_fraction: f64,
    pub seed: u64,
    /// Numeric column whose missing values are replaced by the training median.
    pub impute_column: String,
    pub living_area_threshold: f64,
    pub histogram_bins: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/train.csv"),
            output_dir: PathBuf::from("housefit_output"),
            train_fraction: 0.7,
            seed: 42,
            impute_column: "LotFrontage".to_string(),
            living_area_threshold: 4000.0,
            histogram_bins: 30,
        }
    }
}

impl PipelineConfig {
    /// Reads a TOML file. Fields absent from the file keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&text)?;
        log::debug!("Loaded configuration from '{}': {config:?}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "train_fraction",
                reason: format!("{} is not strictly between 0 and 1", self.train_fraction),
            });
        }
        if !(self.living_area_threshold.is_finite() && self.living_area_threshold > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "living_area_threshold",
                reason: format!("{} is not a positive number", self.living_area_threshold),
            });
        }
        if self.histogram_bins == 0 {
            return Err(ConfigError::InvalidValue {
                field: "histogram_bins",
                reason: "at least one bin is required".to_string(),
            });
        }
        if self.impute_column.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "impute_column",
                reason: "column name is empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn cleaning(&self) -> CleaningConfig {
        CleaningConfig {
            living_area_threshold: self.living_area_threshold,
        }
    }
}
