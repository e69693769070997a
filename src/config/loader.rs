//! Configuration loader for Memory-Scan
//!
//! Handles loading configuration from TOML files and merging with defaults.

use super::defaults::default_config;
use crate::core::types::Address;
use crate::memory::regions::ModuleFilter;
use crate::memory::{MemorySettings, ScanMode, ScanOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_scanner")]
    pub scanner: ScannerConfig,

    #[serde(default = "default_memory")]
    pub memory: MemoryConfig,

    #[serde(default = "default_logging")]
    pub logging: LoggingConfig,
}

/// Scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_max_read_size")]
    pub max_read_size: usize,
    #[serde(default = "default_verify_threads")]
    pub verify_threads: usize,
}

/// Memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_max_address")]
    pub max_address: usize,
    #[serde(default = "default_system_module_fragment")]
    pub system_module_fragment: String,
    #[serde(default = "default_include_all_regions")]
    pub include_all_regions: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Config {
    /// Scan options for the given match mode
    pub fn scan_options(&self, mode: ScanMode) -> ScanOptions {
        ScanOptions {
            max_read_size: self.scanner.max_read_size,
            mode,
            include_all_regions: self.memory.include_all_regions,
            verify_threads: self.scanner.verify_threads,
        }
    }
}

impl From<&MemoryConfig> for MemorySettings {
    fn from(config: &MemoryConfig) -> Self {
        MemorySettings {
            max_address: Address::new(config.max_address),
            module_filter: ModuleFilter::path_fragment(config.system_module_fragment.clone()),
        }
    }
}

/// Configuration loader
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ConfigLoader {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Loads configuration from file
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            return Err(ConfigError::FileNotFound(
                self.config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(&self.config_path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Loads configuration, falling back to defaults only when the file is missing
    pub fn load_or_default(&self) -> Result<Config, ConfigError> {
        match self.load() {
            Err(ConfigError::FileNotFound(_)) => Ok(Config::default()),
            other => other,
        }
    }

    /// Saves configuration to file
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, contents)?;
        Ok(())
    }
}

/// Loads configuration from `path`, or `config.toml` when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let loader = ConfigLoader::new(path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE)));
    loader.load_or_default()
}

// Default functions for serde
fn default_scanner() -> ScannerConfig {
    let defaults = default_config();
    ScannerConfig {
        max_read_size: defaults.scanner.max_read_size,
        verify_threads: defaults.scanner.verify_threads,
    }
}

fn default_memory() -> MemoryConfig {
    let defaults = default_config();
    MemoryConfig {
        max_address: defaults.memory.max_address,
        system_module_fragment: defaults.memory.system_module_fragment,
        include_all_regions: defaults.memory.include_all_regions,
    }
}

fn default_logging() -> LoggingConfig {
    let defaults = default_config();
    LoggingConfig {
        level: defaults.logging.level,
        ansi: defaults.logging.ansi,
    }
}

// Individual field defaults
fn default_max_read_size() -> usize {
    default_config().scanner.max_read_size
}

fn default_verify_threads() -> usize {
    default_config().scanner.verify_threads
}

fn default_max_address() -> usize {
    default_config().memory.max_address
}

fn default_system_module_fragment() -> String {
    default_config().memory.system_module_fragment
}

fn default_include_all_regions() -> bool {
    default_config().memory.include_all_regions
}

fn default_log_level() -> String {
    default_config().logging.level
}

fn default_ansi() -> bool {
    default_config().logging.ansi
}

impl Default for Config {
    fn default() -> Self {
        Config {
            scanner: default_scanner(),
            memory: default_memory(),
            logging: default_logging(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.scanner.max_read_size, 16 * 1024 * 1024);
        assert_eq!(config.memory.max_address, 0x7FFF_FFFF);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_missing_file() {
        let loader = ConfigLoader::new("nonexistent.toml");
        let result = loader.load();
        assert!(matches!(result.unwrap_err(), ConfigError::FileNotFound(_)));

        let config = loader.load_or_default().unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[scanner\nmax_read_size = ").unwrap();

        let result = ConfigLoader::new(&config_path).load_or_default();
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let mut config = Config::default();
        config.memory.system_module_fragment = "System32".to_string();
        let loader = ConfigLoader::new(&config_path);

        loader.save(&config).unwrap();
        assert!(config_path.exists());

        let loaded = load_config(Some(&config_path)).unwrap();
        assert_eq!(loaded.memory.system_module_fragment, "System32");
        assert_eq!(loaded.scanner.max_read_size, config.scanner.max_read_size);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [memory]
            max_address = 0x7FFFFFFFFFFF
            include_all_regions = true
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.memory.max_address, 0x7FFF_FFFF_FFFF);
        assert!(config.memory.include_all_regions);
        // Check defaults are applied
        assert!(config.scanner.verify_threads > 0);
        assert_eq!(config.scanner.max_read_size, 16 * 1024 * 1024);
    }

    #[test]
    fn test_conversions() {
        let mut config = Config::default();
        config.scanner.max_read_size = 4096;
        config.memory.include_all_regions = true;

        let options = config.scan_options(ScanMode::AllMatches);
        assert_eq!(options.max_read_size, 4096);
        assert_eq!(options.mode, ScanMode::AllMatches);
        assert!(options.include_all_regions);

        let settings = MemorySettings::from(&config.memory);
        assert_eq!(settings.max_address, Address::new(0x7FFF_FFFF));
        assert!(matches!(settings.module_filter, ModuleFilter::PathFragment(_)));
    }
}
