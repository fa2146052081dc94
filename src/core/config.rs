//! Configuration for report builds
//!
//! Values are read from YAML. Lookup order: an explicit `--config` path,
//! `./wit.yaml`, the per-user config directory, then built-in defaults.
//! Missing keys fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::clean::{DEFAULT_RT_HIGH, DEFAULT_RT_LOW};
use crate::core::diagnostics::LeveneCenter;

/// Name of the project-local config file
pub const LOCAL_CONFIG_FILE: &str = "wit.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file '{}' not found", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_yml::Error),

    #[error("Invalid value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Study metadata shown in report headers
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StudyConfig {
    pub title: String,
    pub authors: Vec<String>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            title: "Racial Bias in Object Perception".to_string(),
            authors: vec![
                "Juan David Roa".to_string(),
                "Laura Camila Rodríguez G.".to_string(),
            ],
        }
    }
}

/// File names of the three datasets, relative to `data_dir`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatasetFiles {
    pub behavioral: PathBuf,
    pub mvpa: PathBuf,
    pub searchlight: PathBuf,
}

impl Default for DatasetFiles {
    fn default() -> Self {
        Self {
            behavioral: PathBuf::from("ANOVA beh RT.csv"),
            mvpa: PathBuf::from("ANOVA object-sensitive_WIT.csv"),
            searchlight: PathBuf::from("ANOVA searchlight_WIT.csv"),
        }
    }
}

/// Reaction-time outlier filter
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Column the bounds apply to
    pub column: String,

    /// Exclusive lower bound
    pub low: f64,

    /// Exclusive upper bound
    pub high: f64,

    /// Run the behavioral analyses on the filtered table (default: false)
    pub apply_to_analysis: bool,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            column: "rt_raw".to_string(),
            low: DEFAULT_RT_LOW,
            high: DEFAULT_RT_HIGH,
            apply_to_analysis: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub study: StudyConfig,

    /// Directory the dataset files are resolved against
    pub data_dir: PathBuf,

    pub datasets: DatasetFiles,

    pub outliers: OutlierConfig,

    /// Significance level for the interaction verdict and assumption checks
    pub alpha: f64,

    /// Centre for Levene's test
    pub levene_center: LeveneCenter,

    /// Bins in the reaction-time histograms
    pub histogram_bins: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            study: StudyConfig::default(),
            data_dir: PathBuf::from("."),
            datasets: DatasetFiles::default(),
            outliers: OutlierConfig::default(),
            alpha: 0.05,
            levene_center: LeveneCenter::Median,
            histogram_bins: 30,
        }
    }
}

impl Config {
    /// Resolve and load the configuration
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                });
            }
            return Self::from_file(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }
        if let Some(user) = Self::user_config_path().filter(|p| p.exists()) {
            return Self::from_file(&user);
        }

        log::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    /// Read one YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse YAML text and validate it
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yml::from_str(content).map_err(|source| ConfigError::Parse {
                path: PathBuf::new(),
                source,
            })?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yml::to_string(self).map_err(ConfigError::Serialize)
    }

    /// `config.yaml` in the platform config directory, e.g. `~/.config/wit/`
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "wit").map(|d| d.config_dir().join("config.yaml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::Invalid {
                key: "alpha",
                reason: format!("{} is not in (0, 1)", self.alpha),
            });
        }
        if self.outliers.low >= self.outliers.high {
            return Err(ConfigError::Invalid {
                key: "outliers",
                reason: format!(
                    "low bound {} is not below high bound {}",
                    self.outliers.low, self.outliers.high
                ),
            });
        }
        if self.histogram_bins == 0 {
            return Err(ConfigError::Invalid {
                key: "histogram_bins",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute-or-relative path of a dataset file
    pub fn dataset_path(&self, file: &Path) -> PathBuf {
        self.data_dir.join(file)
    }
}
