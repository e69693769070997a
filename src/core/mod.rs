//! Core module containing fundamental types for Memory-Scan
//!
//! This module provides the foundational building blocks used throughout
//! the crate, including address handling, typed values, process and module
//! descriptors, and error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{Address, MemoryError, MemoryResult, MemoryValue, ModuleInfo, ValueType};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
