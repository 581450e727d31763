//! Persisted session configuration at `~/.config/rivulet/config.toml`.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! It is rewritten whenever the session user changes.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// On-disk session state. Any subset of keys may be present; missing keys
/// fall back to `Default::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the logged-in user, if any.
    pub current_user_name: Option<String>,

    /// Overrides the default database location next to the config file.
    pub database_path: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Write the config using write-to-temp-then-rename, so a crash
    /// mid-write never truncates the previous file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let temp_path = path.with_extension("toml.tmp");

        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Record `name` as the active session user and persist immediately.
    pub fn set_current_user(&mut self, name: &str, path: &Path) -> Result<(), ConfigError> {
        self.current_user_name = Some(name.to_string());
        self.save(path)
    }
}
