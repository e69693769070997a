//! The seam between the scanning engine and a concrete target
//!
//! [`ProcessMemory`] is implemented by the native process handles in
//! [`crate::process`] and by [`InMemoryProcess`](crate::memory::InMemoryProcess).
//! Everything above this trait is platform independent.

use crate::core::types::{Address, MemoryResult, ModuleInfo, ProcessId, ThreadControl};
use crate::memory::regions::{MemoryRegion, ProtectionFlags};
use std::sync::Arc;

/// Raw access to the address space of one target process
pub trait ProcessMemory: Send + Sync {
    /// Process id of the target
    fn pid(&self) -> ProcessId;

    /// Executable name of the target, when known
    fn process_name(&self) -> Option<String> {
        None
    }

    /// Copies target memory at `address` into `buffer`
    ///
    /// A copy that stops early at an unreadable page succeeds with the number
    /// of bytes copied. A copy of zero bytes is an error.
    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize>;

    /// Writes `data` at `address`, returning the number of bytes written
    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<usize>;

    /// Describes the region containing `address`, or the free gap starting there
    fn query_region(&self, address: Address) -> MemoryResult<MemoryRegion>;

    /// Changes protection of `[address, address + size)`, returning the previous flags
    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags>;

    /// Reserves and commits `size` bytes of read-write memory
    fn allocate(&self, size: usize) -> MemoryResult<Address>;

    /// Every mapped region in address order, for backends that list them in one pass
    ///
    /// `None` means regions can only be discovered through [`query_region`](Self::query_region).
    fn mapped_regions(&self) -> MemoryResult<Option<Vec<MemoryRegion>>> {
        Ok(None)
    }

    /// True while the target process exists
    fn is_alive(&self) -> bool;

    /// Modules currently loaded in the target
    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>>;

    /// Suspends every thread of the target, skipping threads that cannot be opened
    fn suspend(&self) -> MemoryResult<ThreadControl>;

    /// Resumes every thread of the target, skipping threads that cannot be opened
    fn resume(&self) -> MemoryResult<ThreadControl>;

    /// Handle of the target's main window, if it has one
    fn main_window(&self) -> Option<usize> {
        None
    }

    /// True when writes succeed regardless of page protection
    fn writes_bypass_protection(&self) -> bool {
        false
    }
}

/// Shared backends forward to the inner process, letting a caller keep its own handle
impl<T: ProcessMemory + ?Sized> ProcessMemory for Arc<T> {
    fn pid(&self) -> ProcessId {
        (**self).pid()
    }

    fn process_name(&self) -> Option<String> {
        (**self).process_name()
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        (**self).read_memory(address, buffer)
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        (**self).write_memory(address, data)
    }

    fn query_region(&self, address: Address) -> MemoryResult<MemoryRegion> {
        (**self).query_region(address)
    }

    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        (**self).protect(address, size, protection)
    }

    fn allocate(&self, size: usize) -> MemoryResult<Address> {
        (**self).allocate(size)
    }

    fn mapped_regions(&self) -> MemoryResult<Option<Vec<MemoryRegion>>> {
        (**self).mapped_regions()
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        (**self).modules()
    }

    fn suspend(&self) -> MemoryResult<ThreadControl> {
        (**self).suspend()
    }

    fn resume(&self) -> MemoryResult<ThreadControl> {
        (**self).resume()
    }

    fn main_window(&self) -> Option<usize> {
        (**self).main_window()
    }

    fn writes_bypass_protection(&self) -> bool {
        (**self).writes_bypass_protection()
    }
}
