//! Configuration types for the Fincord engine.
//!
//! This module provides the [`EngineConfig`] struct which carries the knobs a
//! host can tune. Configuration is persisted as TOML; every field has a
//! default, so an empty file (or no file at all) is a valid configuration.
//!
//! # Key Configuration Fields
//!
//! - `files_map_name`: Name of the shared map holding workspace entries
//! - `bootstrap_readme`: Seed a welcome `README.md` into an empty workspace
//! - `open_first_file`: Focus the first file when a session opens
//! - `default_language`: Language hint for files with unknown extensions
//! - `presence`: Fallback identity for peers and the awareness field name
//!
//! # Example
//!
//! ```
//! use fincord_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     bootstrap_readme = false
//!
//!     [presence]
//!     default_label = "Anonymous"
//! "#).unwrap();
//!
//! assert!(!config.bootstrap_readme);
//! assert_eq!(config.presence.default_label, "Anonymous");
//! assert_eq!(config.files_map_name, "files");
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{FincordError, Result};
use crate::language;

/// `EngineConfig` represents the parts of the engine that a host can configure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the shared Y.Map that maps paths to entry records
    pub files_map_name: String,

    /// Create a welcome README.md when a session opens on an empty workspace
    pub bootstrap_readme: bool,

    /// Open and focus the first file when a session opens with nothing active
    pub open_first_file: bool,

    /// Language hint used when a file's extension is not recognized
    pub default_language: String,

    /// Presence rendering and awareness settings
    pub presence: PresenceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            files_map_name: "files".to_string(),
            bootstrap_readme: true,
            open_first_file: true,
            default_language: language::PLAINTEXT.to_string(),
            presence: PresenceConfig::default(),
        }
    }
}

/// Presence settings: fallback identity and awareness field layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Label used for peers that have not published an identity
    pub default_label: String,

    /// Color used for peers that have not published a color
    pub default_color: String,

    /// Awareness state field holding the identity object
    pub identity_field: String,

    /// Awareness state field holding the cursor/selection range
    pub cursor_field: String,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            default_label: "Guest".to_string(),
            default_color: "orangered".to_string(),
            identity_field: "user".to_string(),
            cursor_field: "cursor".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| FincordError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load config from a path, returning the default config if it cannot be read.
    pub fn load_from_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Using default engine config ({})", e);
                Self::default()
            }
        }
    }

    /// Save config to a specific path, creating the parent directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents).map_err(|e| FincordError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_config_parse_error() {
        let err = EngineConfig::from_toml_str("bootstrap_readme = \"yes\"").unwrap_err();
        assert!(matches!(err, FincordError::ConfigParse(_)));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fincord.toml");

        let mut config = EngineConfig::default();
        config.open_first_file = false;
        config.presence.default_color = "#00ff00".to_string();
        config.save_to(&path).unwrap();

        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(matches!(
            EngineConfig::load_from(&path),
            Err(FincordError::FileRead { .. })
        ));
        assert_eq!(EngineConfig::load_from_or_default(&path), EngineConfig::default());
    }
}
