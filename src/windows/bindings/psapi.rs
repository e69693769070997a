//! PSAPI.dll bindings for module enumeration

use crate::core::types::{MemoryError, MemoryResult};
use crate::windows::utils::string_conv::wide_to_string;
use crate::windows::utils::ErrorCode;
use winapi::shared::minwindef::{FALSE, HMODULE, MAX_PATH};
use winapi::um::psapi::{
    EnumProcessModulesEx, GetModuleBaseNameW, GetModuleFileNameExW, GetModuleInformation,
    LIST_MODULES_ALL, MODULEINFO,
};
use winapi::um::winnt::HANDLE;

/// Safe wrapper for EnumProcessModulesEx, listing 32- and 64-bit modules
///
/// # Safety
/// The handle must be a valid process handle
pub unsafe fn enum_process_modules(handle: HANDLE) -> MemoryResult<Vec<HMODULE>> {
    let mut modules: Vec<HMODULE> = vec![std::ptr::null_mut(); 1024];

    loop {
        let capacity = (modules.len() * std::mem::size_of::<HMODULE>()) as u32;
        let mut bytes_needed = 0u32;
        let result = EnumProcessModulesEx(
            handle,
            modules.as_mut_ptr(),
            capacity,
            &mut bytes_needed,
            LIST_MODULES_ALL,
        );

        if result == FALSE {
            return Err(MemoryError::os_call(
                "EnumProcessModulesEx",
                ErrorCode::last_error(),
            ));
        }

        let count = bytes_needed as usize / std::mem::size_of::<HMODULE>();
        if bytes_needed <= capacity {
            modules.truncate(count);
            return Ok(modules);
        }
        modules.resize(count, std::ptr::null_mut());
    }
}

/// Safe wrapper for GetModuleInformation
///
/// # Safety
/// The handle must be a valid process handle and module must be valid
pub unsafe fn get_module_information(handle: HANDLE, module: HMODULE) -> MemoryResult<MODULEINFO> {
    let mut info = MODULEINFO {
        lpBaseOfDll: std::ptr::null_mut(),
        SizeOfImage: 0,
        EntryPoint: std::ptr::null_mut(),
    };

    let result = GetModuleInformation(
        handle,
        module,
        &mut info,
        std::mem::size_of::<MODULEINFO>() as u32,
    );

    if result == FALSE {
        return Err(MemoryError::os_call(
            "GetModuleInformation",
            ErrorCode::last_error(),
        ));
    }

    Ok(info)
}

/// Safe wrapper for GetModuleBaseNameW
///
/// # Safety
/// The handle must be a valid process handle; a null module names the executable
pub unsafe fn get_module_base_name(handle: HANDLE, module: HMODULE) -> MemoryResult<String> {
    let mut buffer = vec![0u16; MAX_PATH];

    let length = GetModuleBaseNameW(handle, module, buffer.as_mut_ptr(), MAX_PATH as u32);

    if length == 0 {
        return Err(MemoryError::os_call("GetModuleBaseNameW", ErrorCode::last_error()));
    }

    Ok(wide_to_string(&buffer[..length as usize]))
}

/// Safe wrapper for GetModuleFileNameExW
///
/// # Safety
/// The handle must be a valid process handle and module must be valid
pub unsafe fn get_module_file_name(handle: HANDLE, module: HMODULE) -> MemoryResult<String> {
    let mut buffer = vec![0u16; MAX_PATH];

    let length = GetModuleFileNameExW(handle, module, buffer.as_mut_ptr(), MAX_PATH as u32);

    if length == 0 {
        return Err(MemoryError::os_call("GetModuleFileNameExW", ErrorCode::last_error()));
    }

    Ok(wide_to_string(&buffer[..length as usize]))
}
