//! Process and thread enumeration using the Windows ToolHelp32 API

use crate::core::types::{MemoryResult, ProcessId, ProcessInfo, ThreadId};
use crate::windows::bindings::kernel32;
use crate::windows::types::Handle;
use crate::windows::utils::ansi_to_string;
use std::mem;
use winapi::shared::minwindef::FALSE;
use winapi::um::tlhelp32::{
    Process32First, Process32Next, Thread32First, Thread32Next, PROCESSENTRY32, TH32CS_SNAPPROCESS,
    TH32CS_SNAPTHREAD, THREADENTRY32,
};

/// Process enumerator using ToolHelp32 API
pub struct ProcessEnumerator {
    snapshot: Handle,
    first_called: bool,
}

impl ProcessEnumerator {
    /// Create a new process enumerator
    pub fn new() -> MemoryResult<Self> {
        let snapshot = kernel32::create_toolhelp_snapshot(TH32CS_SNAPPROCESS, 0)?;
        Ok(ProcessEnumerator {
            snapshot: Handle::new(snapshot),
            first_called: false,
        })
    }
}

impl Iterator for ProcessEnumerator {
    type Item = ProcessInfo;

    fn next(&mut self) -> Option<Self::Item> {
        unsafe {
            let mut entry: PROCESSENTRY32 = mem::zeroed();
            entry.dwSize = mem::size_of::<PROCESSENTRY32>() as u32;

            let success = if !self.first_called {
                self.first_called = true;
                Process32First(self.snapshot.raw(), &mut entry)
            } else {
                Process32Next(self.snapshot.raw(), &mut entry)
            };

            if success == FALSE {
                return None;
            }

            Some(ProcessInfo::new(
                entry.th32ProcessID,
                ansi_to_string(&entry.szExeFile),
            ))
        }
    }
}

/// Enumerate all running processes
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    Ok(ProcessEnumerator::new()?.collect())
}

/// Ids of every thread owned by `pid`
pub fn thread_ids(pid: ProcessId) -> MemoryResult<Vec<ThreadId>> {
    let snapshot = Handle::new(kernel32::create_toolhelp_snapshot(TH32CS_SNAPTHREAD, 0)?);
    let mut threads = Vec::new();

    unsafe {
        let mut entry: THREADENTRY32 = mem::zeroed();
        entry.dwSize = mem::size_of::<THREADENTRY32>() as u32;

        let mut more = Thread32First(snapshot.raw(), &mut entry);
        while more != FALSE {
            if entry.th32OwnerProcessID == pid {
                threads.push(entry.th32ThreadID);
            }
            more = Thread32Next(snapshot.raw(), &mut entry);
        }
    }

    Ok(threads)
}
