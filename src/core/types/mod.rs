//! Core type definitions for Memory-Scan
//!
//! This module contains the fundamental types used throughout the crate:
//! addresses, typed values, process/module descriptors and error types.

mod address;
mod error;
mod process_info;
mod value;

// Re-export all public types
pub use address::Address;
pub use error::{MemoryError, MemoryResult};
pub use process_info::{ModuleInfo, ProcessInfo, ThreadControl};
pub use value::{MemoryValue, ValueType};

// Common type aliases
pub type ProcessId = u32;
pub type ThreadId = u32;
