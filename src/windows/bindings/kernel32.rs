//! Kernel32.dll bindings for process, thread and memory operations

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::utils::ErrorCode;
use std::mem;
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::memoryapi::{
    ReadProcessMemory, VirtualAllocEx, VirtualProtectEx, VirtualQueryEx, WriteProcessMemory,
};
use winapi::um::processthreadsapi::{
    GetExitCodeProcess, OpenProcess, OpenThread, ResumeThread, SuspendThread, TerminateProcess,
};
use winapi::um::tlhelp32::CreateToolhelp32Snapshot;
use winapi::um::winnt::{HANDLE, MEMORY_BASIC_INFORMATION, MEM_COMMIT, MEM_RESERVE, PAGE_READWRITE};

/// Exit code reported by a process that is still running
pub const STILL_ACTIVE: DWORD = 259;

/// Safe wrapper for OpenProcess
pub fn open_process(pid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    unsafe {
        let handle = OpenProcess(desired_access, FALSE, pid);
        if !handle.is_null() {
            return Ok(handle);
        }
    }
    match ErrorCode::last_error() {
        ErrorCode::AccessDenied => Err(MemoryError::access_denied(pid, "OpenProcess refused")),
        _ => Err(MemoryError::ProcessNotFound(format!("PID: {}", pid))),
    }
}

/// Safe wrapper for CloseHandle
///
/// # Safety
/// The handle must be a valid Windows handle
pub unsafe fn close_handle(handle: HANDLE) -> MemoryResult<()> {
    if handle.is_null() {
        return Ok(());
    }

    if CloseHandle(handle) == FALSE {
        Err(MemoryError::last_os_error())
    } else {
        Ok(())
    }
}

/// Safe wrapper for ReadProcessMemory
///
/// A copy cut short by an unreadable page succeeds with the bytes copied.
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn read_process_memory(
    handle: HANDLE,
    address: usize,
    buffer: &mut [u8],
) -> MemoryResult<usize> {
    let mut bytes_read = 0;

    let result = ReadProcessMemory(
        handle,
        address as LPVOID,
        buffer.as_mut_ptr() as LPVOID,
        buffer.len(),
        &mut bytes_read,
    );

    if result != FALSE {
        return Ok(bytes_read);
    }
    match ErrorCode::last_error() {
        ErrorCode::PartialCopy if bytes_read > 0 => Ok(bytes_read),
        code => Err(MemoryError::read_failed(
            format!("0x{:X}", address),
            format!("ReadProcessMemory failed: {}", code),
        )),
    }
}

/// Safe wrapper for WriteProcessMemory
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn write_process_memory(
    handle: HANDLE,
    address: usize,
    data: &[u8],
) -> MemoryResult<usize> {
    let mut bytes_written = 0;

    let result = WriteProcessMemory(
        handle,
        address as LPVOID,
        data.as_ptr() as LPVOID,
        data.len(),
        &mut bytes_written,
    );

    if result != FALSE {
        return Ok(bytes_written);
    }
    match ErrorCode::last_error() {
        ErrorCode::PartialCopy if bytes_written > 0 => Ok(bytes_written),
        code => Err(MemoryError::write_failed(
            format!("0x{:X}", address),
            format!("WriteProcessMemory failed: {}", code),
        )),
    }
}

/// Safe wrapper for VirtualQueryEx
///
/// # Safety
/// The handle must be a valid process handle with appropriate access rights
pub unsafe fn virtual_query_ex(
    handle: HANDLE,
    address: usize,
) -> MemoryResult<MEMORY_BASIC_INFORMATION> {
    let mut mbi: MEMORY_BASIC_INFORMATION = mem::zeroed();

    let result = VirtualQueryEx(
        handle,
        address as LPVOID,
        &mut mbi,
        mem::size_of::<MEMORY_BASIC_INFORMATION>(),
    );

    if result == 0 {
        Err(MemoryError::os_call(
            "VirtualQueryEx",
            format!("0x{:X}: {}", address, ErrorCode::last_error()),
        ))
    } else {
        Ok(mbi)
    }
}

/// Safe wrapper for VirtualProtectEx, returning the previous protection
///
/// # Safety
/// The handle must be a valid process handle with VM_OPERATION access
pub unsafe fn virtual_protect_ex(
    handle: HANDLE,
    address: usize,
    size: usize,
    protection: u32,
) -> MemoryResult<u32> {
    let mut old: DWORD = 0;
    if VirtualProtectEx(handle, address as LPVOID, size, protection, &mut old) == FALSE {
        return Err(MemoryError::ProtectionError(format!(
            "VirtualProtectEx at 0x{:X} failed: {}",
            address,
            ErrorCode::last_error()
        )));
    }
    Ok(old)
}

/// Safe wrapper for VirtualAllocEx committing read-write memory
///
/// # Safety
/// The handle must be a valid process handle with VM_OPERATION access
pub unsafe fn virtual_alloc_ex(handle: HANDLE, size: usize) -> MemoryResult<usize> {
    let base = VirtualAllocEx(
        handle,
        std::ptr::null_mut(),
        size,
        MEM_RESERVE | MEM_COMMIT,
        PAGE_READWRITE,
    );
    if base.is_null() {
        Err(MemoryError::os_call("VirtualAllocEx", ErrorCode::last_error()))
    } else {
        Ok(base as usize)
    }
}

/// Safe wrapper for GetExitCodeProcess
///
/// # Safety
/// The handle must be a valid process handle with QUERY_INFORMATION access
pub unsafe fn get_exit_code_process(handle: HANDLE) -> MemoryResult<u32> {
    let mut code: DWORD = 0;
    if GetExitCodeProcess(handle, &mut code) == FALSE {
        return Err(MemoryError::os_call("GetExitCodeProcess", ErrorCode::last_error()));
    }
    Ok(code)
}

/// Safe wrapper for TerminateProcess
///
/// # Safety
/// The handle must be a valid process handle with TERMINATE access
pub unsafe fn terminate_process(handle: HANDLE, exit_code: u32) -> MemoryResult<()> {
    if TerminateProcess(handle, exit_code) == FALSE {
        return Err(MemoryError::os_call("TerminateProcess", ErrorCode::last_error()));
    }
    Ok(())
}

/// Safe wrapper for OpenThread with suspend/resume rights
pub fn open_thread(tid: u32, desired_access: u32) -> MemoryResult<HANDLE> {
    let handle = unsafe { OpenThread(desired_access, FALSE, tid) };
    if handle.is_null() {
        Err(MemoryError::os_call("OpenThread", ErrorCode::last_error()))
    } else {
        Ok(handle)
    }
}

/// Safe wrapper for SuspendThread
///
/// # Safety
/// The handle must be a valid thread handle with SUSPEND_RESUME access
pub unsafe fn suspend_thread(handle: HANDLE) -> MemoryResult<u32> {
    let previous = SuspendThread(handle);
    if previous == DWORD::MAX {
        Err(MemoryError::os_call("SuspendThread", ErrorCode::last_error()))
    } else {
        Ok(previous)
    }
}

/// Safe wrapper for ResumeThread
///
/// # Safety
/// The handle must be a valid thread handle with SUSPEND_RESUME access
pub unsafe fn resume_thread(handle: HANDLE) -> MemoryResult<u32> {
    let previous = ResumeThread(handle);
    if previous == DWORD::MAX {
        Err(MemoryError::os_call("ResumeThread", ErrorCode::last_error()))
    } else {
        Ok(previous)
    }
}

/// Safe wrapper for CreateToolhelp32Snapshot
pub fn create_toolhelp_snapshot(flags: u32, pid: u32) -> MemoryResult<HANDLE> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(flags, pid) };
    if snapshot.is_null() || snapshot == INVALID_HANDLE_VALUE {
        Err(MemoryError::os_call(
            "CreateToolhelp32Snapshot",
            ErrorCode::last_error(),
        ))
    } else {
        Ok(snapshot)
    }
}
