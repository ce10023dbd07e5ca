//! # Settings file
//!
//! An optional TOML document that names the dataset to load and tunes the verdict
//! threshold table. Every key is optional; unknown keys are rejected so that a typo
//! cannot silently fall back to a default.
//!
//! ```toml
//! dataset = "data/survey.json"
//!
//! [verdict]
//! basis = "relative"
//! thresholds = [1.75, 1.2, 0.8, 0.5]
//! ```

use crate::verdict::{VerdictBasis, VerdictError, VerdictScale};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse TOML settings file: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("The verdict table needs exactly 4 thresholds (one per band above the last), but {0} were given.")]
    ThresholdCount(usize),

    #[error("Invalid verdict table: {0}")]
    Verdict(#[from] VerdictError),

    #[error("No dataset given. Pass --dataset or set `dataset` in the settings file.")]
    MissingDataset,
}

/// The `[verdict]` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerdictSettings {
    #[serde(default)]
    pub basis: VerdictBasis,
    /// Overrides the built-in table for `basis` when present.
    #[serde(default)]
    pub thresholds: Option<Vec<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    #[serde(default)]
    pub dataset: Option<PathBuf>,
    #[serde(default)]
    pub verdict: VerdictSettings,
    /// Directory of the file this config was read from. Relative paths inside the
    /// file are resolved against it.
    #[serde(skip)]
    origin: Option<PathBuf>,
}

impl ProfileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.origin = path.parent().map(Path::to_path_buf);
        log::debug!("Read settings from '{}'", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Builds the verdict table, validating any user-supplied thresholds.
    pub fn verdict_scale(&self) -> Result<VerdictScale, ConfigError> {
        let basis = self.verdict.basis;
        match &self.verdict.thresholds {
            None => Ok(VerdictScale::standard(basis)),
            Some(values) => {
                let thresholds: [f64; 4] = values
                    .as_slice()
                    .try_into()
                    .map_err(|_| ConfigError::ThresholdCount(values.len()))?;
                Ok(VerdictScale::new(basis, thresholds)?)
            }
        }
    }

    /// Picks the dataset path: an explicit `cli` path wins over the settings file.
    pub fn dataset_path(&self, cli: Option<&Path>) -> Result<PathBuf, ConfigError> {
        if let Some(path) = cli {
            return Ok(path.to_path_buf());
        }
        let configured = self.dataset.as_deref().ok_or(ConfigError::MissingDataset)?;
        Ok(match &self.origin {
            Some(dir) if configured.is_relative() => dir.join(configured),
            _ => configured.to_path_buf(),
        })
    }
}
