//! Native process backends
//!
//! Windows targets go through ToolHelp32 and process handles, Linux targets
//! through procfs. Both are exposed as boxed [`ProcessMemory`] so the
//! accessor above never sees the platform.

#[cfg(windows)]
pub mod enumerator;
#[cfg(windows)]
pub mod handle;
#[cfg(target_os = "linux")]
pub mod procfs;

#[cfg(windows)]
pub use enumerator::ProcessEnumerator;
#[cfg(windows)]
pub use handle::{ProcessAccess, ProcessHandle};
#[cfg(target_os = "linux")]
pub use procfs::ProcfsProcess;

use crate::core::types::{MemoryResult, ProcessId, ProcessInfo};
use crate::memory::backend::ProcessMemory;

/// Opens `pid` with the rights needed for reading, writing and thread control
#[cfg(windows)]
pub fn open_process(pid: ProcessId) -> MemoryResult<Box<dyn ProcessMemory>> {
    Ok(Box::new(ProcessHandle::open_all_access(pid)?))
}

/// Opens `pid` through procfs
#[cfg(target_os = "linux")]
pub fn open_process(pid: ProcessId) -> MemoryResult<Box<dyn ProcessMemory>> {
    Ok(Box::new(ProcfsProcess::open(pid)?))
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn open_process(_pid: ProcessId) -> MemoryResult<Box<dyn ProcessMemory>> {
    Err(unsupported("opening processes"))
}

/// Enumerate all running processes
#[cfg(windows)]
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    enumerator::enumerate_processes()
}

/// Enumerate all running processes
#[cfg(target_os = "linux")]
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    procfs::enumerate_processes()
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    Err(unsupported("enumerating processes"))
}

/// Every running process whose executable name matches `name`
pub fn find_processes_by_name(name: &str) -> MemoryResult<Vec<ProcessInfo>> {
    Ok(enumerate_processes()?
        .into_iter()
        .filter(|p| p.matches_name(name))
        .collect())
}

/// Forcibly ends `pid`
#[cfg(windows)]
pub fn terminate_process(pid: ProcessId) -> MemoryResult<()> {
    ProcessHandle::open(pid, ProcessAccess::TERMINATE)?.terminate(1)
}

/// Forcibly ends `pid`
#[cfg(target_os = "linux")]
pub fn terminate_process(pid: ProcessId) -> MemoryResult<()> {
    procfs::terminate(pid)
}

#[cfg(not(any(windows, target_os = "linux")))]
pub fn terminate_process(_pid: ProcessId) -> MemoryResult<()> {
    Err(unsupported("terminating processes"))
}

#[cfg(not(any(windows, target_os = "linux")))]
fn unsupported(what: &str) -> crate::core::types::MemoryError {
    crate::core::types::MemoryError::UnsupportedOperation(format!(
        "{} on this platform",
        what
    ))
}
