//! Windows API layer for the native process backend
//!
//! All unsafe FFI calls are contained within this module. Everything here
//! reports failures as [`MemoryError`](crate::core::types::MemoryError)
//! values carrying the thread's last error code.

pub mod bindings;
pub mod types;
pub mod utils;

pub use bindings::{kernel32, psapi, user32};
pub use types::Handle;
pub use utils::ErrorCode;
