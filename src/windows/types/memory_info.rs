//! Conversion from MEMORY_BASIC_INFORMATION to region snapshots

use crate::core::types::Address;
use crate::memory::regions::{MemoryRegion, ProtectionFlags, RegionState, RegionType};
use winapi::um::winnt::MEMORY_BASIC_INFORMATION;

impl From<MEMORY_BASIC_INFORMATION> for MemoryRegion {
    fn from(mbi: MEMORY_BASIC_INFORMATION) -> Self {
        MemoryRegion {
            base_address: Address::new(mbi.BaseAddress as usize),
            size: mbi.RegionSize,
            allocation_base: Address::new(mbi.AllocationBase as usize),
            allocation_protection: ProtectionFlags::new(mbi.AllocationProtect),
            protection: ProtectionFlags::new(mbi.Protect),
            state: RegionState::from_raw(mbi.State),
            region_type: RegionType::from_raw(mbi.Type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_from_basic_info() {
        let mut mbi: MEMORY_BASIC_INFORMATION = unsafe { std::mem::zeroed() };
        mbi.BaseAddress = 0x10000 as *mut _;
        mbi.AllocationBase = 0x10000 as *mut _;
        mbi.RegionSize = 0x2000;
        mbi.State = 0x1000;
        mbi.Protect = 0x02;
        mbi.AllocationProtect = 0x04;
        mbi.Type = 0x20000;

        let region = MemoryRegion::from(mbi);
        assert_eq!(region.base_address, Address::new(0x10000));
        assert_eq!(region.size, 0x2000);
        assert_eq!(region.state, RegionState::Committed);
        assert_eq!(region.region_type, RegionType::Private);
        assert_eq!(region.protection, ProtectionFlags::read_only());
        assert!(region.is_readable());
        assert!(!region.is_writable());
    }
}
