//! String conversion utilities for Windows API

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

/// Convert Windows wide string (UTF-16) to Rust string, stopping at the first NUL
pub fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    let os_string = OsString::from_wide(&wide[..len]);
    os_string.to_string_lossy().into_owned()
}

/// Convert a fixed-size ANSI buffer such as `szExeFile` to a Rust string
pub fn ansi_to_string(chars: &[i8]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_to_string() {
        let wide = vec![72, 101, 108, 108, 111, 0];
        assert_eq!(wide_to_string(&wide), "Hello");

        let no_null = vec![72, 101, 108, 108, 111];
        assert_eq!(wide_to_string(&no_null), "Hello");
    }

    #[test]
    fn test_ansi_to_string() {
        let mut exe = [0i8; 260];
        for (slot, byte) in exe.iter_mut().zip(b"game.exe") {
            *slot = *byte as i8;
        }
        assert_eq!(ansi_to_string(&exe), "game.exe");
        assert_eq!(ansi_to_string(&[]), "");
    }
}
