//! Application directory paths.
//!
//! Uses the [`dirs`] crate for platform directories.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/controladoria/` | `~/.local/share/controladoria/` |
//! | Config | `~/Library/Application Support/controladoria/` | `~/.config/controladoria/` |
//!
//! Overrides:
//! - `CONTROLADORIA_DATA_DIR` for [`data_dir`]
//! - `CONTROLADORIA_CONFIG_DIR` for [`config_dir`]

use std::path::PathBuf;

const APP_DIR: &str = "controladoria";

/// Data root, holding the run database.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CONTROLADORIA_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("controladoria-data"))
}

/// Config directory, holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("CONTROLADORIA_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| std::env::temp_dir().join("controladoria-config"))
}

/// Default run database (`data_dir()/runs.db`).
#[must_use]
pub fn default_db_path() -> PathBuf {
    data_dir().join("runs.db")
}

/// Default config file (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_stable() {
        assert!(default_db_path().ends_with("runs.db"));
        assert!(config_file().ends_with("config.toml"));
    }
}
