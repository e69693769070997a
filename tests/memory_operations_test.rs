//! Integration tests for the accessor, typed values and region enumeration

use memory_scan::memory::regions::{MemoryRegion, ProtectionFlags, RegionType};
use memory_scan::memory::{
    refresh_all, InMemoryProcess, Memory, MemoryAddress, MemoryWalker, ModuleFilter,
};
use memory_scan::{Address, MemoryError, ModuleInfo, ValueType};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const DATA: usize = 0x10_0000;
const RDATA: usize = 0x20_0000;

fn target() -> Arc<InMemoryProcess> {
    Arc::new(
        InMemoryProcess::new(31337)
            .with_name("game.exe")
            .with_threads(3)
            .with_region(Address::new(DATA), vec![0; 0x1000], ProtectionFlags::read_write())
            .unwrap()
            .with_region(Address::new(RDATA), vec![0; 0x1000], ProtectionFlags::read_only())
            .unwrap(),
    )
}

fn attached(process: &Arc<InMemoryProcess>) -> Memory {
    let mut memory = Memory::new();
    memory.attach(Box::new(Arc::clone(process)));
    memory
}

#[test]
fn test_protect_override_write_restores_protection() {
    let process = target();
    let memory = attached(&process);
    let address = Address::new(RDATA + 0x40);

    let region = memory.query_region(address).unwrap();
    let before = region.protection;
    assert!(!region.is_writable());
    assert!(memory.write(address, &42i32.to_le_bytes()).is_err());

    let mut value = MemoryAddress::new(address, region, ValueType::I32, 0, false);
    value.set_value(&memory, "42").unwrap();

    assert_eq!(value.read_value(&memory).unwrap(), "42");
    assert_eq!(MemoryWalker::new(&memory).get_at::<i32>(address), 42);
    assert_eq!(memory.query_region(address).unwrap().protection, before);
    assert_eq!(process.protect_calls(), 2);
}

#[test]
fn test_typed_round_trip_every_kind() {
    let process = target();
    let memory = attached(&process);
    let region = memory.query_region(Address::new(DATA)).unwrap();

    let cases: &[(ValueType, bool, &str)] = &[
        (ValueType::Bytes, false, "DEADBEEF00"),
        (ValueType::I16, false, "fffe"),
        (ValueType::U16, false, "1a2b"),
        (ValueType::I32, false, "-123456"),
        (ValueType::U32, false, "4000000000"),
        (ValueType::I64, false, "-9000000000000"),
        (ValueType::U64, false, "18000000000000000000"),
        (ValueType::F32, false, "3.25"),
        (ValueType::F64, false, "0.1"),
        (ValueType::String, false, "hello"),
        (ValueType::String, true, "wide text"),
    ];

    for (index, (kind, unicode, text)) in cases.iter().enumerate() {
        let address = Address::new(DATA + index * 0x40);
        let mut value = MemoryAddress::new(address, region, *kind, 0, *unicode);
        value.set_value(&memory, text).unwrap();
        assert_eq!(value.read_value(&memory).unwrap(), *text, "kind {}", kind);
    }
}

#[test]
fn test_string_write_includes_terminator() {
    let process = target();
    let memory = attached(&process);
    let address = Address::new(DATA + 0x100);
    let region = memory.query_region(address).unwrap();

    let mut ascii = MemoryAddress::new(address, region, ValueType::String, 0, false);
    ascii.set_value(&memory, "abc").unwrap();
    assert_eq!(ascii.length, 4);

    let mut wide = MemoryAddress::new(address, region, ValueType::String, 0, true);
    wide.set_value(&memory, "abc").unwrap();
    assert_eq!(wide.length, 8);
    assert_eq!(process.peek(address, 8).unwrap(), b"a\0b\0c\0\0\0".to_vec());
}

#[test]
fn test_refresh_all_reports_each_value() {
    let process = target();
    let memory = attached(&process);
    let region = memory.query_region(Address::new(DATA)).unwrap();

    memory.write(Address::new(DATA), &7u32.to_le_bytes()).unwrap();
    memory.write(Address::new(DATA + 4), &9u32.to_le_bytes()).unwrap();
    let values: Vec<MemoryAddress> = [DATA, DATA + 4]
        .iter()
        .map(|&a| MemoryAddress::new(Address::new(a), region, ValueType::U32, 0, false))
        .collect();

    assert_eq!(
        refresh_all(&values, &memory),
        vec![Some("7".to_string()), Some("9".to_string())]
    );
}

#[test]
fn test_close_is_idempotent() {
    let process = target();
    let mut memory = attached(&process);

    assert!(memory.is_open());
    assert!(memory.close());
    assert!(!memory.close());
    assert!(!memory.is_open());
    assert!(matches!(
        memory.read(Address::new(DATA), 4),
        Err(MemoryError::NotAttached)
    ));
}

#[test]
fn test_regions_are_committed_and_disjoint() {
    let guarded = MemoryRegion::committed(
        Address::new(0x30_0000),
        0x1000,
        ProtectionFlags::read_write().with_guard(),
    );
    let process = Arc::new(
        InMemoryProcess::new(5)
            .with_region(Address::new(DATA), vec![1; 0x2000], ProtectionFlags::read_write())
            .unwrap()
            .with_region_info(guarded, Vec::new())
            .unwrap()
            .with_region(Address::new(0x40_0000), vec![1; 0x1000], ProtectionFlags::read_only())
            .unwrap(),
    );
    let memory = attached(&process);

    let regions = memory.regions(false).unwrap();
    assert_eq!(regions.len(), 2);
    for region in &regions {
        assert!(region.is_committed());
        assert!(!region.is_guarded());
    }
    for pair in regions.windows(2) {
        assert!(!pair[0].overlaps(&pair[1]));
        assert!(pair[0].end_address() <= pair[1].base_address);
    }

    let all = memory.regions(true).unwrap();
    assert!(all.iter().any(|r| r.is_guarded()));
    assert!(all.iter().any(|r| !r.is_committed()));
}

#[test]
fn test_system_modules_are_hidden() {
    let process = Arc::new(
        InMemoryProcess::new(6)
            .with_region(Address::new(DATA), vec![1; 0x1000], ProtectionFlags::read_write())
            .unwrap()
            .with_region_info(
                MemoryRegion::committed(Address::new(RDATA), 0x1000, ProtectionFlags::execute_read())
                    .with_type(RegionType::Image),
                vec![0xC3; 0x1000],
            )
            .unwrap()
            .with_module(ModuleInfo::new(
                "ntdll.dll",
                r"C:\Windows\System32\ntdll.dll",
                Address::new(RDATA),
                0x1000,
            )),
    );
    let mut memory = attached(&process);
    memory.set_module_filter(ModuleFilter::path_fragment("windows"));

    let regions = memory.regions(false).unwrap();
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].base_address, Address::new(DATA));

    memory.set_module_filter(ModuleFilter::Disabled);
    assert_eq!(memory.regions(false).unwrap().len(), 2);
    assert_eq!(
        memory.module_base_address("NTDLL.DLL").unwrap(),
        Some(Address::new(RDATA))
    );
}

#[test]
fn test_suspend_resume_and_exit() {
    let process = target();
    let memory = attached(&process);

    assert_eq!(memory.suspend().unwrap().affected, 3);
    assert!(process.is_suspended());
    memory.resume().unwrap();
    assert!(!process.is_suspended());

    process.set_alive(false);
    assert!(!memory.available());
    assert!(matches!(
        memory.read(Address::new(DATA), 4),
        Err(MemoryError::ProcessExited(31337))
    ));
}

#[test]
fn test_unreadable_reads_are_zero_filled() {
    let process = target();
    let memory = attached(&process);

    let bytes = memory.read(Address::new(0x90_0000), 16).unwrap();
    assert_eq!(bytes, vec![0u8; 16]);

    let mut buffer = [0u8; 8];
    assert!(memory.read_into(Address::new(0x90_0000), &mut buffer).is_err());
}
