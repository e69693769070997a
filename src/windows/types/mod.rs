//! Windows-specific type definitions and wrappers

pub mod handle;
pub mod memory_info;

pub use handle::Handle;
