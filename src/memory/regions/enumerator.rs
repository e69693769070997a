//! Memory region enumeration functionality

use crate::core::types::Address;
use crate::memory::backend::ProcessMemory;
use crate::memory::regions::{locate_region, MemoryRegion};
use tracing::trace;

/// Default enumeration ceiling, kept at 2^31 - 1 for 32-bit targets
pub const DEFAULT_MAX_ADDRESS: Address = Address::new(0x7FFF_FFFF);

/// Walks a target's address space one region at a time
///
/// Yields every region (free, reserved and committed) starting below the
/// ceiling. The walk stops early when a query fails or when the next
/// address would not advance. Backends that list their mappings in one pass
/// are asked once, and the walk then answers queries from that list.
pub struct RegionEnumerator<'a> {
    backend: &'a dyn ProcessMemory,
    current_address: Address,
    max_address: Address,
    mapped: Option<Option<Vec<MemoryRegion>>>,
    finished: bool,
}

impl<'a> RegionEnumerator<'a> {
    /// Create a new region enumerator for a target
    pub fn new(backend: &'a dyn ProcessMemory) -> Self {
        RegionEnumerator {
            backend,
            current_address: Address::new(0),
            max_address: DEFAULT_MAX_ADDRESS,
            mapped: None,
            finished: false,
        }
    }

    /// Set the starting address for enumeration
    pub fn starting_at(mut self, address: Address) -> Self {
        self.current_address = address;
        self
    }

    /// Set the maximum address for enumeration
    pub fn with_max_address(mut self, address: Address) -> Self {
        self.max_address = address;
        self
    }
}

impl Iterator for RegionEnumerator<'_> {
    type Item = MemoryRegion;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished || self.current_address >= self.max_address {
            return None;
        }

        if self.mapped.is_none() {
            match self.backend.mapped_regions() {
                Ok(list) => self.mapped = Some(list),
                Err(e) => {
                    trace!(error = %e, "region listing failed");
                    self.finished = true;
                    return None;
                }
            }
        }

        let queried = match self.mapped.as_ref().and_then(Option::as_ref) {
            Some(list) => locate_region(list, self.current_address),
            None => self.backend.query_region(self.current_address),
        };
        let region = match queried {
            Ok(region) => region,
            Err(e) => {
                trace!(address = %self.current_address, error = %e, "region walk ended");
                self.finished = true;
                return None;
            }
        };

        let next = region.end_address();
        if next <= self.current_address {
            trace!(address = %self.current_address, "region walk stopped advancing");
            self.finished = true;
        } else {
            self.current_address = next;
        }
        Some(region)
    }
}
