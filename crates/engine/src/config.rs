//! Container configuration via `keyspan.toml`
//!
//! A map can be configured from a small TOML file instead of the builder.
//! [`MapConfig::write_default_if_missing`] drops a commented default next to
//! the application; edit it and reopen the map to change settings.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use keyspan_codec::{get_codec, DEFAULT_CODEC_ID};

use crate::error::{Error, Result};

/// Config file name
pub const CONFIG_FILE_NAME: &str = "keyspan.toml";

/// Map configuration loaded from `keyspan.toml`.
///
/// # Example
///
/// ```toml
/// key_codec = "fixed_point"
/// value_codec = "fixed_point"
/// # max_values_per_key = 5
/// wait_increment_ms = 1000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapConfig {
    /// Codec id for keys
    #[serde(default = "default_codec")]
    pub key_codec: String,
    /// Codec id for values
    #[serde(default = "default_codec")]
    pub value_codec: String,
    /// Values retained per key. Absent keeps only the newest value; `0`
    /// keeps every value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_values_per_key: Option<usize>,
    /// Default poll interval for `wait_for`, in milliseconds
    #[serde(default = "default_wait_increment_ms")]
    pub wait_increment_ms: u64,
}

fn default_codec() -> String {
    DEFAULT_CODEC_ID.to_string()
}

fn default_wait_increment_ms() -> u64 {
    1000
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            key_codec: default_codec(),
            value_codec: default_codec(),
            max_values_per_key: None,
            wait_increment_ms: default_wait_increment_ms(),
        }
    }
}

impl MapConfig {
    /// Store retention implied by `max_values_per_key`; `None` keeps all
    pub fn retention(&self) -> Option<usize> {
        match self.max_values_per_key {
            None => Some(1),
            Some(0) => None,
            Some(n) => Some(n),
        }
    }

    /// True if more than one value per key is retained
    pub fn is_multi_valued(&self) -> bool {
        self.retention() != Some(1)
    }

    /// Default poll interval for bounded waits
    pub fn wait_increment(&self) -> Duration {
        Duration::from_millis(self.wait_increment_ms)
    }

    /// Check that both codec ids are known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the unknown id.
    pub fn validate(&self) -> Result<()> {
        for id in [&self.key_codec, &self.value_codec] {
            get_codec(id).map_err(|e| {
                Error::Configuration(format!("Invalid codec in {}: {}", CONFIG_FILE_NAME, e))
            })?;
        }
        if self.wait_increment_ms == 0 {
            return Err(Error::Configuration(
                "wait_increment_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Keyspan map configuration
#
# Codecs: "fixed_point" (default, order preserving), "long", "opaque"
key_codec = "fixed_point"
value_codec = "fixed_point"

# Values retained per key. Leave unset for a single-valued map.
# 0 retains every value.
# max_values_per_key = 5

# Poll interval for wait_for, in milliseconds (default: 1000)
wait_increment_ms = 1000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or names an
    /// unknown codec.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: MapConfig = toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Io(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Io(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_single_valued() {
        let config = MapConfig::default();
        assert_eq!(config.key_codec, "fixed_point");
        assert_eq!(config.retention(), Some(1));
        assert!(!config.is_multi_valued());
        assert_eq!(config.wait_increment(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_toml_parses() {
        let config: MapConfig = toml::from_str(MapConfig::default_toml()).unwrap();
        assert_eq!(config, MapConfig::default());
    }

    #[test]
    fn test_retention_mapping() {
        let mut config = MapConfig::default();
        config.max_values_per_key = Some(0);
        assert_eq!(config.retention(), None);
        config.max_values_per_key = Some(5);
        assert_eq!(config.retention(), Some(5));
        assert!(config.is_multi_valued());
    }

    #[test]
    fn test_write_default_if_missing_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        MapConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());
        let config = MapConfig::from_file(&path).unwrap();
        assert_eq!(config, MapConfig::default());
    }

    #[test]
    fn test_write_default_if_missing_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "value_codec = \"long\"\n").unwrap();
        MapConfig::write_default_if_missing(&path).unwrap();
        let config = MapConfig::from_file(&path).unwrap();
        assert_eq!(config.value_codec, "long");
        assert_eq!(config.key_codec, "fixed_point");
    }

    #[test]
    fn test_write_to_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = MapConfig {
            value_codec: "opaque".to_string(),
            max_values_per_key: Some(3),
            wait_increment_ms: 50,
            ..MapConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(MapConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_unknown_codec_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "key_codec = \"zstd\"\n").unwrap();
        let err = MapConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "key_codec = [").unwrap();
        assert!(matches!(
            MapConfig::from_file(&path),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(MapConfig::from_file(&path), Err(Error::Io(_))));
    }
}
