//! Owned Windows HANDLE that closes itself on drop

use crate::windows::bindings::kernel32;
use std::fmt;
use std::ptr;
use tracing::trace;
use winapi::um::winnt::HANDLE;

/// Owned kernel object handle with RAII semantics
pub struct Handle {
    handle: HANDLE,
}

impl Handle {
    /// Takes ownership of `handle`
    pub fn new(handle: HANDLE) -> Self {
        Handle { handle }
    }

    pub fn null() -> Self {
        Handle {
            handle: ptr::null_mut(),
        }
    }

    pub fn is_null(&self) -> bool {
        self.handle.is_null()
    }

    /// Get the raw handle; it stays owned by `self`
    pub fn raw(&self) -> HANDLE {
        self.handle
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.handle.is_null() {
            return;
        }
        if let Err(e) = unsafe { kernel32::close_handle(self.handle) } {
            trace!(error = %e, "CloseHandle failed");
        }
        self.handle = ptr::null_mut();
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", self.handle)
    }
}

// Kernel handles are process-wide values, usable from any thread
unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        let handle = Handle::null();
        assert!(handle.is_null());
        assert_eq!(handle.raw(), ptr::null_mut());
    }

    #[test]
    #[cfg_attr(miri, ignore = "FFI not supported in Miri")]
    fn test_owned_handle_closes() {
        let raw = kernel32::open_process(std::process::id(), 0x0400).unwrap();
        let handle = Handle::new(raw);
        assert!(!handle.is_null());
        drop(handle);
    }
}
