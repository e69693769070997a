//! Page protection flags and temporary protection overrides

use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::memory::backend::ProcessMemory;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Page protection flags using the `PAGE_*` encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtectionFlags {
    value: u32,
}

impl ProtectionFlags {
    pub const PAGE_NOACCESS: u32 = 0x01;
    pub const PAGE_READONLY: u32 = 0x02;
    pub const PAGE_READWRITE: u32 = 0x04;
    pub const PAGE_WRITECOPY: u32 = 0x08;
    pub const PAGE_EXECUTE: u32 = 0x10;
    pub const PAGE_EXECUTE_READ: u32 = 0x20;
    pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;
    pub const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;
    pub const PAGE_GUARD: u32 = 0x100;
    pub const PAGE_NOCACHE: u32 = 0x200;
    pub const PAGE_WRITECOMBINE: u32 = 0x400;

    const BASE_MASK: u32 = 0xFF;

    /// Create new protection flags
    pub const fn new(value: u32) -> Self {
        ProtectionFlags { value }
    }

    pub const fn no_access() -> Self {
        ProtectionFlags::new(Self::PAGE_NOACCESS)
    }

    pub const fn read_only() -> Self {
        ProtectionFlags::new(Self::PAGE_READONLY)
    }

    pub const fn read_write() -> Self {
        ProtectionFlags::new(Self::PAGE_READWRITE)
    }

    pub const fn execute_read() -> Self {
        ProtectionFlags::new(Self::PAGE_EXECUTE_READ)
    }

    pub const fn execute_read_write() -> Self {
        ProtectionFlags::new(Self::PAGE_EXECUTE_READWRITE)
    }

    /// Builds flags from POSIX-style read/write/execute permissions
    pub fn from_rwx(read: bool, write: bool, execute: bool) -> Self {
        let value = match (read, write, execute) {
            (false, false, false) => Self::PAGE_NOACCESS,
            (true, false, false) => Self::PAGE_READONLY,
            (_, true, false) => Self::PAGE_READWRITE,
            (false, false, true) => Self::PAGE_EXECUTE,
            (true, false, true) => Self::PAGE_EXECUTE_READ,
            (_, true, true) => Self::PAGE_EXECUTE_READWRITE,
        };
        ProtectionFlags::new(value)
    }

    fn base(&self) -> u32 {
        self.value & Self::BASE_MASK
    }

    /// Check if protection allows reading
    pub fn is_readable(&self) -> bool {
        !matches!(self.base(), 0 | Self::PAGE_NOACCESS | Self::PAGE_EXECUTE)
    }

    /// Check if protection allows writing
    pub fn is_writable(&self) -> bool {
        (self.value
            & (Self::PAGE_READWRITE
                | Self::PAGE_WRITECOPY
                | Self::PAGE_EXECUTE_READWRITE
                | Self::PAGE_EXECUTE_WRITECOPY))
            != 0
    }

    /// Check if protection allows execution
    pub fn is_executable(&self) -> bool {
        (self.value
            & (Self::PAGE_EXECUTE
                | Self::PAGE_EXECUTE_READ
                | Self::PAGE_EXECUTE_READWRITE
                | Self::PAGE_EXECUTE_WRITECOPY))
            != 0
    }

    /// Check if guard page flag is set
    pub fn is_guard(&self) -> bool {
        (self.value & Self::PAGE_GUARD) != 0
    }

    /// Add guard page flag
    pub fn with_guard(mut self) -> Self {
        self.value |= Self::PAGE_GUARD;
        self
    }

    /// The closest protection that permits writing
    ///
    /// Executable pages stay executable. Cache modifiers are kept, the
    /// guard flag is dropped.
    pub fn writable_counterpart(&self) -> Self {
        if self.is_writable() {
            return *self;
        }
        let base = if self.is_executable() {
            Self::PAGE_EXECUTE_READWRITE
        } else {
            Self::PAGE_READWRITE
        };
        let modifiers = self.value & !Self::BASE_MASK & !Self::PAGE_GUARD;
        ProtectionFlags::new(base | modifiers)
    }

    /// Get the raw protection value
    pub fn raw(&self) -> u32 {
        self.value
    }
}

impl Default for ProtectionFlags {
    fn default() -> Self {
        ProtectionFlags::no_access()
    }
}

impl std::fmt::Display for ProtectionFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let base = match self.base() {
            Self::PAGE_NOACCESS => "NOACCESS",
            Self::PAGE_READONLY => "R",
            Self::PAGE_READWRITE => "RW",
            Self::PAGE_WRITECOPY => "WC",
            Self::PAGE_EXECUTE => "X",
            Self::PAGE_EXECUTE_READ => "RX",
            Self::PAGE_EXECUTE_READWRITE => "RWX",
            Self::PAGE_EXECUTE_WRITECOPY => "WCX",
            0 => "-",
            _ => "UNKNOWN",
        };
        f.write_str(base)?;
        if self.is_guard() {
            f.write_str("+G")?;
        }
        if (self.value & Self::PAGE_NOCACHE) != 0 {
            f.write_str("+NC")?;
        }
        Ok(())
    }
}

/// Runs `operation` with `[address, address + size)` made writable
///
/// The previous protection reported by the OS is restored afterwards
/// whether or not the operation succeeded. A failed restore is reported as
/// a [`MemoryError::ProtectionError`] even when the operation itself worked.
pub fn unprotect_for_operation<F, R>(
    backend: &dyn ProcessMemory,
    address: Address,
    size: usize,
    current: ProtectionFlags,
    operation: F,
) -> MemoryResult<R>
where
    F: FnOnce() -> MemoryResult<R>,
{
    let temporary = current.writable_counterpart();
    let previous = backend.protect(address, size, temporary)?;
    trace!(%address, size, from = %previous, to = %temporary, "protection lifted");

    let result = operation();

    if let Err(e) = backend.protect(address, size, previous) {
        warn!(%address, size, error = %e, "failed to restore protection");
        return Err(MemoryError::ProtectionError(format!(
            "could not restore {} at {}: {}",
            previous, address, e
        )));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_predicates() {
        let ro = ProtectionFlags::read_only();
        assert!(ro.is_readable());
        assert!(!ro.is_writable());
        assert!(!ro.is_executable());

        let rx = ProtectionFlags::execute_read();
        assert!(rx.is_readable() && rx.is_executable());

        let x = ProtectionFlags::new(ProtectionFlags::PAGE_EXECUTE);
        assert!(!x.is_readable());

        assert!(!ProtectionFlags::no_access().is_readable());
        assert!(ProtectionFlags::read_write().with_guard().is_guard());
    }

    #[test]
    fn test_writable_counterpart() {
        assert_eq!(
            ProtectionFlags::read_only().writable_counterpart(),
            ProtectionFlags::read_write()
        );
        assert_eq!(
            ProtectionFlags::execute_read().writable_counterpart(),
            ProtectionFlags::execute_read_write()
        );
        assert_eq!(
            ProtectionFlags::read_write().writable_counterpart(),
            ProtectionFlags::read_write()
        );
        let guarded = ProtectionFlags::read_only().with_guard();
        assert!(!guarded.writable_counterpart().is_guard());
    }

    #[test]
    fn test_from_rwx() {
        assert_eq!(ProtectionFlags::from_rwx(true, false, false), ProtectionFlags::read_only());
        assert_eq!(ProtectionFlags::from_rwx(true, true, false), ProtectionFlags::read_write());
        assert_eq!(
            ProtectionFlags::from_rwx(true, false, true),
            ProtectionFlags::execute_read()
        );
        assert_eq!(ProtectionFlags::from_rwx(false, false, false), ProtectionFlags::no_access());
    }

    #[test]
    fn test_display() {
        assert_eq!(ProtectionFlags::read_write().to_string(), "RW");
        assert_eq!(ProtectionFlags::read_only().with_guard().to_string(), "R+G");
    }
}
