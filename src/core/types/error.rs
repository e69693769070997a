//! Custom error types for Memory-Scan

use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Access denied to process {pid}: {reason}")]
    AccessDenied { pid: u32, reason: String },

    #[error("No process is attached")]
    NotAttached,

    #[error("Process {0} has exited")]
    ProcessExited(u32),

    #[error("Failed to read memory at {address}: {reason}")]
    ReadFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Invalid pattern format: {0}")]
    InvalidPattern(String),

    #[error("The mask is bad: pattern has {pattern_len} bytes, mask has {mask_len}")]
    BadMask { pattern_len: usize, mask_len: usize },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Memory protection error: {0}")]
    ProtectionError(String),

    #[error("Region at {0} is unreadable")]
    RegionUnreadable(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{call} failed: {reason}")]
    OsCall { call: &'static str, reason: String },

    #[cfg(windows)]
    #[error("Windows API error: {0}")]
    WindowsApiError(#[from] windows::core::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates an error from the calling thread's last OS error
    #[cfg(windows)]
    pub fn last_os_error() -> Self {
        MemoryError::WindowsApiError(windows::core::Error::from_win32())
    }

    /// Creates an error from the calling thread's last OS error
    #[cfg(not(windows))]
    pub fn last_os_error() -> Self {
        MemoryError::IoError(std::io::Error::last_os_error())
    }

    /// Creates an access denied error for a process
    pub fn access_denied(pid: u32, reason: impl Into<String>) -> Self {
        MemoryError::AccessDenied {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates a read failed error
    pub fn read_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::ReadFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an OS call failure error
    pub fn os_call(call: &'static str, reason: impl fmt::Display) -> Self {
        MemoryError::OsCall {
            call,
            reason: reason.to_string(),
        }
    }

    /// True when the error means the target can no longer be used
    pub fn is_target_unavailable(&self) -> bool {
        matches!(
            self,
            MemoryError::NotAttached
                | MemoryError::ProcessExited(_)
                | MemoryError::ProcessNotFound(_)
                | MemoryError::AccessDenied { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::InvalidAddress("0xDEADBEEF".to_string());
        assert_eq!(err.to_string(), "Invalid memory address: 0xDEADBEEF");

        let err = MemoryError::access_denied(1234, "OpenProcess refused");
        assert_eq!(
            err.to_string(),
            "Access denied to process 1234: OpenProcess refused"
        );
    }

    #[test]
    fn test_bad_mask_display() {
        let err = MemoryError::BadMask {
            pattern_len: 4,
            mask_len: 3,
        };
        assert!(err.to_string().starts_with("The mask is bad"));
    }

    #[test]
    fn test_helper_methods() {
        match MemoryError::read_failed("0xABCD", "invalid page") {
            MemoryError::ReadFailed { address, reason } => {
                assert_eq!(address, "0xABCD");
                assert_eq!(reason, "invalid page");
            }
            _ => panic!("Wrong error type"),
        }

        match MemoryError::os_call("VirtualQueryEx", "code 87") {
            MemoryError::OsCall { call, reason } => {
                assert_eq!(call, "VirtualQueryEx");
                assert_eq!(reason, "code 87");
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_target_unavailable_classification() {
        assert!(MemoryError::NotAttached.is_target_unavailable());
        assert!(MemoryError::ProcessExited(10).is_target_unavailable());
        assert!(!MemoryError::InvalidPattern("x".into()).is_target_unavailable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test");
        let mem_err: MemoryError = io_err.into();
        assert!(matches!(mem_err, MemoryError::IoError(_)));
    }
}
