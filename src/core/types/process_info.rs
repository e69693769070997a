//! Process, module and thread-control information types

use super::{Address, ProcessId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A running process as seen by name lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: ProcessId,
    pub name: String,
}

impl ProcessInfo {
    pub fn new(pid: ProcessId, name: impl Into<String>) -> Self {
        ProcessInfo {
            pid,
            name: name.into(),
        }
    }

    /// Case-insensitive name match that ignores a trailing `.exe` on either side
    pub fn matches_name(&self, name: &str) -> bool {
        fn stem(s: &str) -> String {
            let lower = s.trim().to_ascii_lowercase();
            match lower.strip_suffix(".exe") {
                Some(stem) => stem.to_string(),
                None => lower,
            }
        }
        stem(&self.name) == stem(name)
    }
}

/// Information about a loaded module in a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub path: PathBuf,
    pub base_address: Address,
    pub size: usize,
}

impl ModuleInfo {
    /// Creates a new ModuleInfo
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        base_address: Address,
        size: usize,
    ) -> Self {
        ModuleInfo {
            name: name.into(),
            path: path.into(),
            base_address,
            size,
        }
    }

    /// Gets the end address of the module (exclusive)
    pub fn end_address(&self) -> Address {
        self.base_address + self.size
    }

    /// Checks if an address is within this module
    pub fn contains_address(&self, address: Address) -> bool {
        address >= self.base_address && address < self.end_address()
    }

    /// Checks if `[base, base + size)` lies entirely inside this module
    pub fn contains_range(&self, base: Address, size: usize) -> bool {
        base >= self.base_address
            && base
                .checked_add(size)
                .map_or(false, |end| end <= self.end_address())
    }
}

/// Outcome of a suspend or resume pass over a process's threads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadControl {
    /// Threads that were suspended or resumed
    pub affected: usize,
    /// Threads that could not be opened or changed
    pub skipped: usize,
}
