//! Default configuration values for Memory-Scan

use crate::memory::regions::enumerator::DEFAULT_MAX_ADDRESS;
use crate::memory::regions::filter::DEFAULT_SYSTEM_FRAGMENT;
use crate::memory::scanner::DEFAULT_MAX_READ_SIZE;
use serde::{Deserialize, Serialize};

/// Default configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigDefaults {
    pub scanner: ScannerDefaults,
    pub memory: MemoryDefaults,
    pub logging: LoggingDefaults,
}

/// Default scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerDefaults {
    pub max_read_size: usize,
    pub verify_threads: usize,
}

/// Default memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDefaults {
    pub max_address: usize,
    pub system_module_fragment: String,
    pub include_all_regions: bool,
}

/// Default logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingDefaults {
    pub level: String,
    pub ansi: bool,
}

/// Returns the default configuration
pub fn default_config() -> ConfigDefaults {
    ConfigDefaults {
        scanner: ScannerDefaults {
            max_read_size: DEFAULT_MAX_READ_SIZE, // 16MB
            verify_threads: num_cpus::get().min(8),
        },
        memory: MemoryDefaults {
            max_address: DEFAULT_MAX_ADDRESS.as_usize(),
            system_module_fragment: DEFAULT_SYSTEM_FRAGMENT.to_string(),
            include_all_regions: false,
        },
        logging: LoggingDefaults {
            level: "info".to_string(),
            ansi: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_defaults() {
        let config = default_config();
        assert_eq!(config.scanner.max_read_size, 16 * 1024 * 1024);
        assert!(config.scanner.verify_threads > 0);
        assert!(config.scanner.verify_threads <= 8);
    }

    #[test]
    fn test_memory_defaults() {
        let config = default_config();
        assert_eq!(config.memory.max_address, 0x7FFF_FFFF);
        assert!(!config.memory.system_module_fragment.is_empty());
        assert!(!config.memory.include_all_regions);
    }

    #[test]
    fn test_logging_defaults() {
        let config = default_config();
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_serialization() {
        let config = default_config();
        let serialized = toml::to_string(&config).unwrap();
        assert!(serialized.contains("max_read_size"));
        assert!(serialized.contains("system_module_fragment"));

        let deserialized: ConfigDefaults = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.memory.max_address, config.memory.max_address);
        assert_eq!(deserialized.logging.level, config.logging.level);
    }
}
