//! User32.dll bindings for locating a process's main window

use winapi::shared::minwindef::{BOOL, DWORD, FALSE, LPARAM, TRUE};
use winapi::shared::windef::HWND;
use winapi::um::winuser::{EnumWindows, GetWindow, GetWindowThreadProcessId, IsWindowVisible, GW_OWNER};

struct WindowSearch {
    pid: DWORD,
    found: HWND,
}

unsafe extern "system" fn match_main_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let search = &mut *(lparam as *mut WindowSearch);
    let mut owner_pid: DWORD = 0;
    GetWindowThreadProcessId(hwnd, &mut owner_pid);

    let is_main = owner_pid == search.pid
        && GetWindow(hwnd, GW_OWNER).is_null()
        && IsWindowVisible(hwnd) != FALSE;
    if is_main {
        search.found = hwnd;
        return FALSE;
    }
    TRUE
}

/// First visible, unowned top-level window belonging to `pid`
pub fn find_main_window(pid: u32) -> Option<usize> {
    let mut search = WindowSearch {
        pid,
        found: std::ptr::null_mut(),
    };
    // EnumWindows reports failure when the callback stops early, so only the
    // search result is meaningful
    unsafe {
        EnumWindows(
            Some(match_main_window),
            &mut search as *mut WindowSearch as LPARAM,
        );
    }
    if search.found.is_null() {
        None
    } else {
        Some(search.found as usize)
    }
}
