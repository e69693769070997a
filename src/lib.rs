//! Memory-Scan: process memory introspection and signature scanning
//!
//! Open a target process, enumerate its committed regions, read and write
//! typed values (overriding page protection when needed) and search its
//! memory for byte signatures with optional wildcard masks.

pub mod config;
pub mod core;
pub mod memory;
pub mod process;
#[cfg(windows)]
pub mod windows;

// Re-export main types from core module
pub use crate::core::types::{
    Address, MemoryError, MemoryResult, MemoryValue, ModuleInfo, ProcessId, ProcessInfo,
    ThreadControl, ThreadId, ValueType,
};

pub use memory::{
    InMemoryProcess, Memory, MemoryAddress, MemoryRegion, MemorySettings, MemoryWalker,
    OpenOutcome, ProcessMemory, ScanCancel, ScanError, ScanEvent, ScanMode, ScanOptions,
    ScanOutcome, SigScanner, Signature,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(crate::core::VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_reexports_compose() {
        let mut data = vec![0u8; 0x100];
        data[0x20..0x24].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let process = InMemoryProcess::new(7)
            .with_region(Address::new(0x1000), data, memory::ProtectionFlags::read_write())
            .unwrap();
        let mut memory = Memory::new();
        assert_eq!(memory.attach(Box::new(process)), 7);

        let signature: Signature = "DE ?? BE EF".parse().unwrap();
        let mut scanner = SigScanner::new(&memory, ScanOptions::default()).unwrap();
        assert_eq!(
            scanner.scan_signature(&signature),
            ScanOutcome::Found(Address::new(0x1020))
        );
    }
}
