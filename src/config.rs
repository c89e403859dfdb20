//! Configuration for generation, storage, and import defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ControlError, Result};
use crate::runs::materializer::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_HORIZON_DAYS};
use crate::schedule::rule::MAX_DAY_OF_MONTH;

/// Top-level configuration, stored as TOML.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Run generation settings.
    pub generation: GenerationConfig,
    /// Run store settings.
    pub store: StoreConfig,
    /// Defaults applied to imported rows.
    pub import: ImportConfig,
}

/// Run generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Window used when no end date is given, in days past the start.
    pub horizon_days: u32,
    /// Widest accepted window.
    pub max_horizon_days: u32,
    /// Runs per insert call.
    pub batch_size: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            horizon_days: 30,
            max_horizon_days: DEFAULT_MAX_HORIZON_DAYS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Run store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: crate::app_dirs::default_db_path(),
        }
    }
}

/// Defaults for imported template rows that leave schedule fields blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Business day of the month for monthly rows.
    pub default_workday: u8,
    /// Weekday for weekly rows, 0=Sunday..6=Saturday.
    pub default_weekday: u8,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_workday: 5,
            default_weekday: 1,
        }
    }
}

impl ControlConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        let g = &self.generation;
        if g.batch_size == 0 {
            return Err(ControlError::Config("generation.batch_size must be at least 1".into()));
        }
        if g.horizon_days > g.max_horizon_days {
            return Err(ControlError::Config(format!(
                "generation.horizon_days ({}) exceeds max_horizon_days ({})",
                g.horizon_days, g.max_horizon_days
            )));
        }
        if self.import.default_weekday > 6 {
            return Err(ControlError::Config(format!(
                "import.default_weekday must be 0..=6, got {}",
                self.import.default_weekday
            )));
        }
        if !(1..=MAX_DAY_OF_MONTH).contains(&self.import.default_workday) {
            return Err(ControlError::Config(format!(
                "import.default_workday must be 1..={MAX_DAY_OF_MONTH}, got {}",
                self.import.default_workday
            )));
        }
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ControlError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise the defaults. The result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file is unreadable, malformed, or invalid.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ControlError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }
}
