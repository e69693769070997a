//! Memory region snapshots and enumeration
//!
//! A [`MemoryRegion`] is an immutable snapshot of one contiguous range of a
//! target's address space with uniform state and protection. Regions are
//! produced fresh by every enumeration pass and never updated in place.

pub mod enumerator;
pub mod filter;
pub mod protection;

pub use enumerator::RegionEnumerator;
pub use filter::{ModuleFilter, RegionFilter};
pub use protection::ProtectionFlags;

use crate::core::types::{Address, MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};

/// State of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionState {
    /// Memory is committed and backed by storage
    Committed,
    /// Memory is reserved but not committed
    Reserved,
    /// Memory is free/unallocated
    Free,
}

impl RegionState {
    pub const MEM_COMMIT: u32 = 0x1000;
    pub const MEM_RESERVE: u32 = 0x2000;
    pub const MEM_FREE: u32 = 0x10000;

    /// Maps a raw `MEM_*` state value
    pub fn from_raw(value: u32) -> Self {
        match value {
            Self::MEM_COMMIT => RegionState::Committed,
            Self::MEM_RESERVE => RegionState::Reserved,
            _ => RegionState::Free,
        }
    }
}

/// Type of memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionType {
    /// Private memory
    Private,
    /// Mapped memory (file mapping)
    Mapped,
    /// Image memory (executable/DLL)
    Image,
}

impl RegionType {
    pub const MEM_PRIVATE: u32 = 0x20000;
    pub const MEM_MAPPED: u32 = 0x40000;
    pub const MEM_IMAGE: u32 = 0x1000000;

    /// Maps a raw `MEM_*` type value
    pub fn from_raw(value: u32) -> Self {
        match value {
            Self::MEM_MAPPED => RegionType::Mapped,
            Self::MEM_IMAGE => RegionType::Image,
            _ => RegionType::Private,
        }
    }
}

/// Snapshot of one region of a target's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    /// Base address of the region
    pub base_address: Address,
    /// Size of the region in bytes
    pub size: usize,
    /// Base of the allocation this region belongs to
    pub allocation_base: Address,
    /// Protection the allocation was created with
    pub allocation_protection: ProtectionFlags,
    /// Current protection
    pub protection: ProtectionFlags,
    pub state: RegionState,
    pub region_type: RegionType,
}

impl MemoryRegion {
    /// Creates a committed private region with the given protection
    pub fn committed(base_address: Address, size: usize, protection: ProtectionFlags) -> Self {
        MemoryRegion {
            base_address,
            size,
            allocation_base: base_address,
            allocation_protection: protection,
            protection,
            state: RegionState::Committed,
            region_type: RegionType::Private,
        }
    }

    /// Creates a free (unallocated) gap
    pub fn free(base_address: Address, size: usize) -> Self {
        MemoryRegion {
            base_address,
            size,
            allocation_base: Address::new(0),
            allocation_protection: ProtectionFlags::new(0),
            protection: ProtectionFlags::no_access(),
            state: RegionState::Free,
            region_type: RegionType::Private,
        }
    }

    /// Sets the region type
    pub fn with_type(mut self, region_type: RegionType) -> Self {
        self.region_type = region_type;
        self
    }

    /// Get the end address of the region (exclusive)
    pub fn end_address(&self) -> Address {
        self.base_address + self.size
    }

    /// Check if an address is within this region
    pub fn contains(&self, address: Address) -> bool {
        address >= self.base_address && address < self.end_address()
    }

    /// Check if `[address, address + len)` lies entirely within this region
    pub fn contains_range(&self, address: Address, len: usize) -> bool {
        self.contains(address)
            && address
                .checked_add(len)
                .map_or(false, |end| end <= self.end_address())
    }

    /// Check if two regions share at least one byte
    pub fn overlaps(&self, other: &MemoryRegion) -> bool {
        self.base_address < other.end_address() && other.base_address < self.end_address()
    }

    pub fn is_committed(&self) -> bool {
        self.state == RegionState::Committed
    }

    /// Check if the region can be read
    pub fn is_readable(&self) -> bool {
        self.is_committed() && self.protection.is_readable() && !self.protection.is_guard()
    }

    /// Check if the region can be written without changing its protection
    pub fn is_writable(&self) -> bool {
        self.is_committed() && self.protection.is_writable()
    }

    pub fn is_executable(&self) -> bool {
        self.protection.is_executable()
    }

    /// Check if the region is guarded
    pub fn is_guarded(&self) -> bool {
        self.protection.is_guard()
    }
}

/// Answers a region query against a sorted, non-overlapping region list
///
/// Returns the region containing `address`, or a free gap starting at
/// `address` and running to the next region. Addresses past the last
/// region are an error, which ends enumeration.
pub fn locate_region<'a, I>(regions: I, address: Address) -> MemoryResult<MemoryRegion>
where
    I: IntoIterator<Item = &'a MemoryRegion>,
{
    for region in regions {
        if region.contains(address) {
            return Ok(*region);
        }
        if region.base_address > address {
            return Ok(MemoryRegion::free(address, region.base_address - address));
        }
    }
    Err(MemoryError::InvalidAddress(format!(
        "{} is beyond the last mapped region",
        address
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(base: usize, size: usize) -> MemoryRegion {
        MemoryRegion::committed(Address::new(base), size, ProtectionFlags::read_write())
    }

    #[test]
    fn test_raw_state_and_type() {
        assert_eq!(RegionState::from_raw(0x1000), RegionState::Committed);
        assert_eq!(RegionState::from_raw(0x2000), RegionState::Reserved);
        assert_eq!(RegionState::from_raw(0x10000), RegionState::Free);
        assert_eq!(RegionType::from_raw(0x1000000), RegionType::Image);
        assert_eq!(RegionType::from_raw(0x40000), RegionType::Mapped);
    }

    #[test]
    fn test_contains_and_overlap() {
        let a = region(0x1000, 0x1000);
        assert!(a.contains(Address::new(0x1000)));
        assert!(a.contains(Address::new(0x1FFF)));
        assert!(!a.contains(Address::new(0x2000)));
        assert!(a.contains_range(Address::new(0x1FFC), 4));
        assert!(!a.contains_range(Address::new(0x1FFC), 5));

        assert!(!a.overlaps(&region(0x2000, 0x100)));
        assert!(a.overlaps(&region(0x1800, 0x1000)));
    }

    #[test]
    fn test_guarded_region_is_not_readable() {
        let mut r = region(0x1000, 0x1000);
        r.protection = ProtectionFlags::read_write().with_guard();
        assert!(r.is_guarded());
        assert!(!r.is_readable());
    }

    #[test]
    fn test_locate_region() {
        let regions = vec![region(0x1000, 0x1000), region(0x4000, 0x1000)];

        let hit = locate_region(&regions, Address::new(0x1800)).unwrap();
        assert_eq!(hit.base_address, Address::new(0x1000));

        let gap = locate_region(&regions, Address::new(0x2000)).unwrap();
        assert_eq!(gap.state, RegionState::Free);
        assert_eq!(gap.size, 0x2000);

        let leading = locate_region(&regions, Address::new(0)).unwrap();
        assert_eq!(leading.size, 0x1000);

        assert!(locate_region(&regions, Address::new(0x5000)).is_err());
    }
}
