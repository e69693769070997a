//! Configuration validator for Memory-Scan
//!
//! Validates configuration values to ensure they are within acceptable ranges.

use super::loader::{Config, ConfigError, LoggingConfig, MemoryConfig, ScannerConfig};
use tracing::warn;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates the entire configuration
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_scanner(&config.scanner)?;
        Self::validate_memory(&config.memory)?;
        Self::validate_logging(&config.logging)?;
        Ok(())
    }

    /// Validates scanner configuration
    fn validate_scanner(scanner: &ScannerConfig) -> Result<(), ConfigError> {
        if scanner.max_read_size == 0 {
            return Err(ConfigError::Invalid(
                "Maximum read size must be greater than 0".to_string(),
            ));
        }

        // Chunks are allocated whole
        if scanner.max_read_size > 1024 * 1024 * 1024 {
            warn!(
                max_read_size = scanner.max_read_size,
                "maximum read size exceeds 1GB"
            );
        }

        if scanner.verify_threads == 0 {
            return Err(ConfigError::Invalid(
                "Verify threads must be at least 1".to_string(),
            ));
        }

        if scanner.verify_threads > 128 {
            return Err(ConfigError::Invalid(
                "Verify threads cannot exceed 128".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates memory configuration
    fn validate_memory(memory: &MemoryConfig) -> Result<(), ConfigError> {
        if memory.max_address == 0 {
            return Err(ConfigError::Invalid(
                "Maximum address must be greater than 0".to_string(),
            ));
        }

        if memory.system_module_fragment.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "System module fragment cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates logging configuration
    fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// Validates a configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    ConfigValidator::validate(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_read_size() {
        let mut config = Config::default();
        config.scanner.max_read_size = 0;
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("read size"));
    }

    #[test]
    fn test_invalid_thread_count() {
        let mut config = Config::default();
        config.scanner.verify_threads = 0;
        assert!(validate_config(&config).is_err());

        config.scanner.verify_threads = 129;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_memory_section() {
        let mut config = Config::default();
        config.memory.max_address = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.memory.system_module_fragment = "  ".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("fragment"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("log level"));
    }

    #[test]
    fn test_edge_cases() {
        let mut config = Config::default();

        config.scanner.max_read_size = 1;
        config.scanner.verify_threads = 1;
        config.memory.max_address = 1;
        config.logging.level = "TRACE".to_string();
        assert!(validate_config(&config).is_ok());

        config.scanner.verify_threads = 128;
        config.memory.max_address = usize::MAX;
        assert!(validate_config(&config).is_ok());
    }
}
