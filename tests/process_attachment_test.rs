//! Tests against the current process through the native backend

#![cfg(any(windows, target_os = "linux"))]

use memory_scan::memory::{
    Memory, MemorySettings, MemoryWalker, ModuleFilter, OpenOutcome, ScanOptions, SigScanner,
    Signature,
};
use memory_scan::Address;

fn open_self() -> Memory {
    let mut memory = Memory::with_settings(MemorySettings {
        max_address: Address::new(usize::MAX),
        module_filter: ModuleFilter::default(),
    });
    memory.open(std::process::id()).unwrap();
    memory
}

#[test]
#[cfg_attr(miri, ignore = "FFI not supported in Miri")]
fn test_open_and_read_self() {
    let memory = open_self();
    assert!(memory.available());
    assert_eq!(memory.pid(), Some(std::process::id()));
    assert!(memory.process_name().is_some());

    let value = Box::new(0x0BAD_F00D_u32);
    let address = Address::new(&*value as *const u32 as usize);
    assert_eq!(MemoryWalker::new(&memory).get_at::<u32>(address), 0x0BAD_F00D);
}

#[test]
#[cfg_attr(miri, ignore = "FFI not supported in Miri")]
fn test_write_self() {
    let memory = open_self();
    let mut value = Box::new(0u64);
    let address = Address::new(&mut *value as *mut u64 as usize);

    memory.write(address, &0x1122_3344_5566_7788u64.to_le_bytes()).unwrap();
    let observed = unsafe { std::ptr::read_volatile(&*value) };
    assert_eq!(observed, 0x1122_3344_5566_7788);
}

#[test]
#[cfg_attr(miri, ignore = "FFI not supported in Miri")]
fn test_scan_heap_buffer_in_self() {
    let memory = open_self();
    let buffer: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(29) ^ 0x5A).collect();
    let address = Address::new(buffer.as_ptr() as usize);
    let region = memory.query_region(address).unwrap();
    assert!(region.contains_range(address, buffer.len()));

    let signature = Signature::from_bytes(buffer[8..24].to_vec(), None).unwrap();
    let mut scanner = SigScanner::with_regions(&memory, ScanOptions::all_matches(), vec![region]);
    scanner.scan_signature(&signature);

    assert!(scanner.matches().contains_key(&(address + 8)));
}

#[test]
#[cfg_attr(miri, ignore = "FFI not supported in Miri")]
fn test_regions_of_self() {
    let memory = open_self();
    let regions = memory.regions(false).unwrap();
    assert!(!regions.is_empty());
    for pair in regions.windows(2) {
        assert!(pair[0].end_address() <= pair[1].base_address);
    }
}

#[test]
#[cfg_attr(miri, ignore = "FFI not supported in Miri")]
fn test_open_unknown_name() {
    let mut memory = Memory::new();
    assert_eq!(
        memory.open_by_name("definitely-not-running-3b9d").unwrap(),
        OpenOutcome::NotFound
    );
    assert!(!memory.is_open());
}
