// --- Analysis Configuration ---
// The human-editable description of one MPI analysis, stored as TOML. It names the
// domains and their indicator columns, optionally fixes weights, and sets the cutoff.

use crate::compute::{self, ComputeError, DEFAULT_POVERTY_THRESHOLD};
use crate::types::{Dimensions, DimensionsError, ResolvedWeights};
use crate::weights::{self, WeightError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid dimensions: {0}")]
    Dimensions(#[from] DimensionsError),
    #[error("The config does not declare any domains.")]
    NoDomains,
    #[error("Invalid poverty threshold: {0}")]
    Threshold(#[from] ComputeError),
    #[error("Invalid weights: {0}")]
    Weights(#[from] WeightError),
}

fn default_threshold() -> f64 {
    DEFAULT_POVERTY_THRESHOLD
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_threshold")]
    pub poverty_threshold: f64,
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub domain_weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indicator_weights: BTreeMap<String, f64>,
}

impl AnalysisConfig {
    /// A config with equal weighting and the default cutoff.
    pub fn new(dimensions: Dimensions) -> Self {
        Self {
            poverty_threshold: DEFAULT_POVERTY_THRESHOLD,
            dimensions,
            domain_weights: BTreeMap::new(),
            indicator_weights: BTreeMap::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Checks the cutoff and that there is something to weight.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions.is_empty() {
            return Err(ConfigError::NoDomains);
        }
        compute::validate_threshold(self.poverty_threshold)?;
        Ok(())
    }

    pub fn resolve_weights(&self) -> Result<ResolvedWeights, ConfigError> {
        let resolved = weights::resolve_weights(
            &self.dimensions,
            Some(&self.domain_weights),
            Some(&self.indicator_weights),
        )?;
        Ok(resolved)
    }

    /// Builds a starting config from a table header: every column that is not an
    /// identifier becomes a single-indicator domain of the same name.
    pub fn template_from_columns<S: AsRef<str>>(
        columns: &[S],
        id_columns: &[String],
    ) -> Result<Self, ConfigError> {
        let domains: Vec<(String, Vec<String>)> = columns
            .iter()
            .map(|c| c.as_ref().to_string())
            .filter(|c| !id_columns.contains(c))
            .map(|c| (c.clone(), vec![c]))
            .collect();
        let dimensions = Dimensions::new(domains)?;
        let config = Self::new(dimensions);
        config.validate()?;
        Ok(config)
    }
}
