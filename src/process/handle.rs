//! Native Windows process backend

use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleInfo, ProcessId, ThreadControl,
};
use crate::memory::backend::ProcessMemory;
use crate::memory::regions::{MemoryRegion, ProtectionFlags};
use crate::process::enumerator::thread_ids;
use crate::windows::bindings::{kernel32, psapi, user32};
use crate::windows::types::Handle;
use std::fmt;
use tracing::{debug, warn};
use winapi::um::winnt::HANDLE;

/// Access rights for process handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessAccess {
    value: u32,
}

impl ProcessAccess {
    /// All possible access rights
    pub const ALL_ACCESS: Self = Self { value: 0x1FFFFF };
    pub const TERMINATE: Self = Self { value: 0x0001 };
    /// Query information access
    pub const QUERY_INFORMATION: Self = Self { value: 0x0400 };
    pub const QUERY_LIMITED_INFORMATION: Self = Self { value: 0x1000 };
    /// Read memory access
    pub const VM_READ: Self = Self { value: 0x0010 };
    /// Write memory access
    pub const VM_WRITE: Self = Self { value: 0x0020 };
    /// Protection changes and allocation
    pub const VM_OPERATION: Self = Self { value: 0x0008 };

    /// Combine access rights
    pub fn combine(rights: &[Self]) -> Self {
        Self {
            value: rights.iter().fold(0, |acc, right| acc | right.value),
        }
    }

    /// Get raw value
    pub fn value(&self) -> u32 {
        self.value
    }
}

const THREAD_SUSPEND_RESUME: u32 = 0x0002;

/// An opened Windows process
pub struct ProcessHandle {
    handle: Handle,
    pid: ProcessId,
    access: ProcessAccess,
    name: Option<String>,
}

impl ProcessHandle {
    /// Open a process with specified access rights
    pub fn open(pid: ProcessId, access: ProcessAccess) -> MemoryResult<Self> {
        let handle = Handle::new(kernel32::open_process(pid, access.value())?);
        let name = unsafe { psapi::get_module_base_name(handle.raw(), std::ptr::null_mut()) }.ok();
        debug!(pid, access = format_args!("0x{:X}", access.value()), "opened process");
        Ok(ProcessHandle {
            handle,
            pid,
            access,
            name,
        })
    }

    /// Open a process with all access rights
    pub fn open_all_access(pid: ProcessId) -> MemoryResult<Self> {
        Self::open(pid, ProcessAccess::ALL_ACCESS)
    }

    pub fn access(&self) -> ProcessAccess {
        self.access
    }

    fn raw(&self) -> HANDLE {
        self.handle.raw()
    }

    fn thread_pass(&self, suspend: bool) -> MemoryResult<ThreadControl> {
        let mut outcome = ThreadControl::default();
        for tid in thread_ids(self.pid)? {
            let result = kernel32::open_thread(tid, THREAD_SUSPEND_RESUME).and_then(|raw| {
                let thread = Handle::new(raw);
                unsafe {
                    if suspend {
                        kernel32::suspend_thread(thread.raw())
                    } else {
                        kernel32::resume_thread(thread.raw())
                    }
                }
            });
            match result {
                Ok(_) => outcome.affected += 1,
                Err(e) => {
                    warn!(pid = self.pid, tid, error = %e, "skipped thread");
                    outcome.skipped += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Terminates the process with `exit_code`
    pub fn terminate(&self, exit_code: u32) -> MemoryResult<()> {
        unsafe { kernel32::terminate_process(self.raw(), exit_code) }
    }
}

impl ProcessMemory for ProcessHandle {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn process_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let read = unsafe { kernel32::read_process_memory(self.raw(), address.as_usize(), buffer)? };
        if read == 0 {
            return Err(MemoryError::read_failed(address, "no bytes copied"));
        }
        Ok(read)
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let written = unsafe { kernel32::write_process_memory(self.raw(), address.as_usize(), data)? };
        if written == 0 {
            return Err(MemoryError::write_failed(address, "no bytes copied"));
        }
        Ok(written)
    }

    fn query_region(&self, address: Address) -> MemoryResult<MemoryRegion> {
        let mbi = unsafe { kernel32::virtual_query_ex(self.raw(), address.as_usize())? };
        Ok(MemoryRegion::from(mbi))
    }

    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        let old = unsafe {
            kernel32::virtual_protect_ex(self.raw(), address.as_usize(), size, protection.raw())?
        };
        Ok(ProtectionFlags::new(old))
    }

    fn allocate(&self, size: usize) -> MemoryResult<Address> {
        if size == 0 {
            return Err(MemoryError::InvalidValue(
                "allocation size must be greater than 0".to_string(),
            ));
        }
        let base = unsafe { kernel32::virtual_alloc_ex(self.raw(), size)? };
        Ok(Address::new(base))
    }

    fn is_alive(&self) -> bool {
        unsafe { kernel32::get_exit_code_process(self.raw()) }
            .map_or(false, |code| code == kernel32::STILL_ACTIVE)
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        let handles = unsafe { psapi::enum_process_modules(self.raw())? };
        let mut modules = Vec::with_capacity(handles.len());
        for module in handles {
            let (info, name, path) = unsafe {
                (
                    psapi::get_module_information(self.raw(), module)?,
                    psapi::get_module_base_name(self.raw(), module).unwrap_or_default(),
                    psapi::get_module_file_name(self.raw(), module).unwrap_or_default(),
                )
            };
            modules.push(ModuleInfo::new(
                name,
                path,
                Address::new(info.lpBaseOfDll as usize),
                info.SizeOfImage as usize,
            ));
        }
        Ok(modules)
    }

    fn suspend(&self) -> MemoryResult<ThreadControl> {
        self.thread_pass(true)
    }

    fn resume(&self) -> MemoryResult<ThreadControl> {
        self.thread_pass(false)
    }

    fn main_window(&self) -> Option<usize> {
        user32::find_main_window(self.pid)
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("access", &format!("0x{:X}", self.access.value()))
            .finish()
    }
}
