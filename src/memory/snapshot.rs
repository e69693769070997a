//! A process image held entirely in local memory
//!
//! [`InMemoryProcess`] behaves like a live target: reads and writes honour
//! page protection, region queries follow the same gap semantics as the OS,
//! and the process can be marked as exited. It is used to scan offline
//! dumps and as a deterministic target in tests.

use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleInfo, ProcessId, ThreadControl,
};
use crate::memory::backend::ProcessMemory;
use crate::memory::regions::{locate_region, MemoryRegion, ProtectionFlags};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const PAGE_SIZE: usize = 0x1000;
const ALLOCATION_GRANULARITY: usize = 0x10000;

struct Region {
    info: MemoryRegion,
    data: Vec<u8>,
}

struct Image {
    regions: Vec<Region>,
    modules: Vec<ModuleInfo>,
    alive: bool,
    suspended: bool,
    protect_calls: usize,
}

/// An in-process stand-in for a target process
pub struct InMemoryProcess {
    pid: ProcessId,
    name: Option<String>,
    threads: usize,
    lists_regions: bool,
    region_queries: AtomicUsize,
    image: RwLock<Image>,
}

impl InMemoryProcess {
    /// Creates an empty image with the given process id
    pub fn new(pid: ProcessId) -> Self {
        InMemoryProcess {
            pid,
            name: None,
            threads: 1,
            lists_regions: false,
            region_queries: AtomicUsize::new(0),
            image: RwLock::new(Image {
                regions: Vec::new(),
                modules: Vec::new(),
                alive: true,
                suspended: false,
                protect_calls: 0,
            }),
        }
    }

    /// Sets the reported executable name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the number of threads suspend/resume report
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Hands out the whole region list at once, like a backend reading a maps file
    pub fn with_region_listing(mut self) -> Self {
        self.lists_regions = true;
        self
    }

    /// Adds a committed private region holding `data`
    pub fn with_region(
        self,
        base: Address,
        data: Vec<u8>,
        protection: ProtectionFlags,
    ) -> MemoryResult<Self> {
        let info = MemoryRegion::committed(base, data.len(), protection);
        self.insert_region(info, data)?;
        Ok(self)
    }

    /// Adds a region with explicit metadata; `data` is zero-extended to the region size
    pub fn with_region_info(self, info: MemoryRegion, data: Vec<u8>) -> MemoryResult<Self> {
        self.insert_region(info, data)?;
        Ok(self)
    }

    /// Registers a loaded module
    pub fn with_module(self, module: ModuleInfo) -> Self {
        self.write_image().modules.push(module);
        self
    }

    /// Inserts a region, rejecting overlaps with existing regions
    pub fn insert_region(&self, info: MemoryRegion, mut data: Vec<u8>) -> MemoryResult<()> {
        if info.end_address() < info.base_address {
            return Err(MemoryError::InvalidAddress(format!(
                "region at {} wraps the address space",
                info.base_address
            )));
        }
        let mut image = self.write_image();
        if let Some(existing) = image.regions.iter().find(|r| r.info.overlaps(&info)) {
            return Err(MemoryError::InvalidAddress(format!(
                "region at {} overlaps region at {}",
                info.base_address, existing.info.base_address
            )));
        }
        data.resize(info.size, 0);
        let position = image
            .regions
            .partition_point(|r| r.info.base_address < info.base_address);
        image.regions.insert(position, Region { info, data });
        Ok(())
    }

    /// Marks the process as exited (or alive again)
    pub fn set_alive(&self, alive: bool) {
        self.write_image().alive = alive;
    }

    pub fn is_suspended(&self) -> bool {
        self.read_image().suspended
    }

    /// Number of single-region queries answered so far
    pub fn region_queries(&self) -> usize {
        self.region_queries.load(Ordering::Relaxed)
    }

    /// Number of protection changes requested so far
    pub fn protect_calls(&self) -> usize {
        self.read_image().protect_calls
    }

    /// Current protection of the region containing `address`
    pub fn protection_at(&self, address: Address) -> Option<ProtectionFlags> {
        self.read_image()
            .regions
            .iter()
            .find(|r| r.info.contains(address))
            .map(|r| r.info.protection)
    }

    /// Copy of `len` bytes at `address`, ignoring protection
    pub fn peek(&self, address: Address, len: usize) -> Option<Vec<u8>> {
        let image = self.read_image();
        let region = image.regions.iter().find(|r| r.info.contains(address))?;
        let start = address - region.info.base_address;
        region.data.get(start..start.checked_add(len)?).map(<[u8]>::to_vec)
    }

    fn read_image(&self) -> RwLockReadGuard<'_, Image> {
        self.image.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_image(&self) -> RwLockWriteGuard<'_, Image> {
        self.image.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_alive(&self, image: &Image) -> MemoryResult<()> {
        if image.alive {
            Ok(())
        } else {
            Err(MemoryError::ProcessExited(self.pid))
        }
    }

    fn thread_pass(&self, suspended: bool) -> MemoryResult<ThreadControl> {
        let mut image = self.write_image();
        self.ensure_alive(&image)?;
        image.suspended = suspended;
        Ok(ThreadControl {
            affected: self.threads,
            skipped: 0,
        })
    }
}

/// One contiguous piece of a transfer: region index, offset in region, offset in buffer, length
type Span = (usize, usize, usize, usize);

/// Splits `[address, address + len)` over consecutive regions accepted by
/// `usable`, stopping at the first gap or rejected region
fn spans<F>(regions: &[Region], address: Address, len: usize, usable: F) -> Vec<Span>
where
    F: Fn(&MemoryRegion) -> bool,
{
    let mut spans = Vec::new();
    let mut done = 0;
    while done < len {
        let cursor = address + done;
        let Some(index) = regions.iter().position(|r| r.info.contains(cursor)) else {
            break;
        };
        let info = &regions[index].info;
        if !usable(info) {
            break;
        }
        let offset = cursor - info.base_address;
        let count = (info.size - offset).min(len - done);
        spans.push((index, offset, done, count));
        done += count;
    }
    spans
}

impl ProcessMemory for InMemoryProcess {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn process_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        let image = self.read_image();
        self.ensure_alive(&image)?;
        let mut copied = 0;
        for (index, offset, at, count) in
            spans(&image.regions, address, buffer.len(), MemoryRegion::is_readable)
        {
            let source = &image.regions[index].data[offset..offset + count];
            buffer[at..at + count].copy_from_slice(source);
            copied += count;
        }
        if copied == 0 && !buffer.is_empty() {
            return Err(MemoryError::read_failed(address, "page is not readable"));
        }
        Ok(copied)
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        let mut image = self.write_image();
        self.ensure_alive(&image)?;
        let mut written = 0;
        for (index, offset, at, count) in
            spans(&image.regions, address, data.len(), MemoryRegion::is_writable)
        {
            image.regions[index].data[offset..offset + count].copy_from_slice(&data[at..at + count]);
            written += count;
        }
        if written == 0 && !data.is_empty() {
            return Err(MemoryError::write_failed(address, "page is not writable"));
        }
        Ok(written)
    }

    fn query_region(&self, address: Address) -> MemoryResult<MemoryRegion> {
        self.region_queries.fetch_add(1, Ordering::Relaxed);
        let image = self.read_image();
        self.ensure_alive(&image)?;
        locate_region(image.regions.iter().map(|r| &r.info), address)
    }

    fn mapped_regions(&self) -> MemoryResult<Option<Vec<MemoryRegion>>> {
        if !self.lists_regions {
            return Ok(None);
        }
        let image = self.read_image();
        self.ensure_alive(&image)?;
        Ok(Some(image.regions.iter().map(|r| r.info).collect()))
    }

    /// Applies `protection` to every region the range touches
    fn protect(
        &self,
        address: Address,
        size: usize,
        protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        let mut image = self.write_image();
        self.ensure_alive(&image)?;
        image.protect_calls += 1;

        let end = address + size.max(1);
        let mut previous = None;
        let touched = image.regions.iter_mut().filter(|r| {
            r.info.is_committed() && r.info.base_address < end && address < r.info.end_address()
        });
        for region in touched {
            previous.get_or_insert(region.info.protection);
            region.info.protection = protection;
        }
        previous.ok_or_else(|| {
            MemoryError::ProtectionError(format!("no committed memory at {}", address))
        })
    }

    fn allocate(&self, size: usize) -> MemoryResult<Address> {
        if size == 0 {
            return Err(MemoryError::InvalidValue(
                "allocation size must be greater than 0".to_string(),
            ));
        }
        let size = size.div_ceil(PAGE_SIZE) * PAGE_SIZE;
        let base = {
            let image = self.read_image();
            self.ensure_alive(&image)?;
            let top = image
                .regions
                .last()
                .map_or(ALLOCATION_GRANULARITY, |r| r.info.end_address().as_usize());
            top.div_ceil(ALLOCATION_GRANULARITY) * ALLOCATION_GRANULARITY
        };
        let base = Address::new(base);
        self.insert_region(
            MemoryRegion::committed(base, size, ProtectionFlags::read_write()),
            Vec::new(),
        )?;
        Ok(base)
    }

    fn is_alive(&self) -> bool {
        self.read_image().alive
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        let image = self.read_image();
        self.ensure_alive(&image)?;
        Ok(image.modules.clone())
    }

    fn suspend(&self) -> MemoryResult<ThreadControl> {
        self.thread_pass(true)
    }

    fn resume(&self) -> MemoryResult<ThreadControl> {
        self.thread_pass(false)
    }
}
