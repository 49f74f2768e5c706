//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use sieve_extractor::ExtractionConfig;
use sieve_store::{StoreConfig, StoreUrl};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SieveConfig {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Extraction run settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Display settings
    #[serde(default)]
    pub settings: Settings,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl SieveConfig {
    /// Default configuration file path (`~/.sieve/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".sieve").join("config.toml"))
    }

    /// Resolve an explicit path or fall back to the default one.
    pub fn path(explicit: Option<&str>) -> Result<PathBuf> {
        match explicit {
            Some(path) => Ok(PathBuf::from(path)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: SieveConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Serialize as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Replace the store connection string.
    pub fn override_url(&mut self, url: &str) -> Result<()> {
        self.store.url = StoreUrl::parse(url)?;
        Ok(())
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.extraction.validate().map_err(CliError::Config)?;
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SieveConfig::default();
        assert_eq!(config.store.max_connections, 8);
        assert_eq!(config.extraction.parallelism, 4);
        assert!(config.settings.color);
        assert_eq!(config.settings.format, OutputFormat::Table);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = SieveConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.url, StoreConfig::default().url);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SieveConfig::default();
        config.override_url("sqlite://corpus.db").unwrap();
        config.store.max_connections = 2;
        config.extraction.parallelism = 16;
        config.settings.format = OutputFormat::Json;
        config.save(&path).unwrap();

        let loaded = SieveConfig::load(&path).unwrap();
        assert_eq!(loaded.store, config.store);
        assert_eq!(loaded.extraction, config.extraction);
        assert_eq!(loaded.settings.format, OutputFormat::Json);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store]\nmax_connections = 3\n").unwrap();

        let config = SieveConfig::load(&path).unwrap();
        assert_eq!(config.store.max_connections, 3);
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[extraction]\nparallelism = 0\n").unwrap();
        assert!(matches!(SieveConfig::load(&path), Err(CliError::Config(_))));

        assert!(SieveConfig::default().override_url("postgres://db").is_err());
    }
}
