//! The `Memory` facade: one opened target and raw access to it
//!
//! A [`Memory`] is either closed or attached to exactly one target through a
//! [`ProcessMemory`] backend; it is never partially open. Every operation
//! returns a [`MemoryResult`] so an unstable target can never crash the
//! caller. Reads follow a lenient contract: once the target is known to be
//! alive, a short or failed copy still yields a buffer of the requested size
//! with the unread tail zero-filled. Use [`Memory::read_into`] when the exact
//! byte count matters.

use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleInfo, ProcessId, ProcessInfo, ThreadControl,
};
use crate::memory::backend::ProcessMemory;
use crate::memory::regions::enumerator::DEFAULT_MAX_ADDRESS;
use crate::memory::regions::protection::unprotect_for_operation;
use crate::memory::regions::{MemoryRegion, ModuleFilter, RegionEnumerator, RegionFilter};
use crate::process;
use tracing::{debug, trace};

/// Tunables for region enumeration
#[derive(Debug, Clone)]
pub struct MemorySettings {
    /// Enumeration stops at the first region starting at or above this address
    pub max_address: Address,
    /// Decides which modules are hidden from the default region list
    pub module_filter: ModuleFilter,
}

impl Default for MemorySettings {
    fn default() -> Self {
        MemorySettings {
            max_address: DEFAULT_MAX_ADDRESS,
            module_filter: ModuleFilter::default(),
        }
    }
}

/// Result of opening a target by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Exactly one process matched and it is now open
    Opened(ProcessId),
    /// No process matched
    NotFound,
    /// Several processes matched; none was opened
    Ambiguous(Vec<ProcessId>),
}

struct AttachedProcess {
    backend: Box<dyn ProcessMemory>,
    pid: ProcessId,
    name: Option<String>,
    window: Option<usize>,
}

/// Raw read/write access to one target process
pub struct Memory {
    attached: Option<AttachedProcess>,
    settings: MemorySettings,
}

impl Memory {
    /// Creates a closed accessor with default settings
    pub fn new() -> Self {
        Memory::with_settings(MemorySettings::default())
    }

    pub fn with_settings(settings: MemorySettings) -> Self {
        Memory {
            attached: None,
            settings,
        }
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    /// Replaces the filter used to hide system modules
    pub fn set_module_filter(&mut self, filter: ModuleFilter) {
        self.settings.module_filter = filter;
    }

    /// Opens a native process by id, closing any current target first
    pub fn open(&mut self, pid: ProcessId) -> MemoryResult<()> {
        self.close();
        let backend = process::open_process(pid)?;
        self.attach(backend);
        Ok(())
    }

    /// Opens the only native process whose executable name matches `name`
    pub fn open_by_name(&mut self, name: &str) -> MemoryResult<OpenOutcome> {
        let candidates = process::find_processes_by_name(name)?;
        self.open_candidate(name, &candidates, process::open_process)
    }

    /// Opens the sole entry of `candidates` through `open`
    ///
    /// Several candidates are reported back without opening any of them,
    /// and whatever target was attached before stays attached.
    fn open_candidate<F>(
        &mut self,
        name: &str,
        candidates: &[ProcessInfo],
        open: F,
    ) -> MemoryResult<OpenOutcome>
    where
        F: FnOnce(ProcessId) -> MemoryResult<Box<dyn ProcessMemory>>,
    {
        match candidates {
            [] => Ok(OpenOutcome::NotFound),
            [only] => {
                let backend = open(only.pid)?;
                self.attach(backend);
                if let Some(attached) = self.attached.as_mut() {
                    attached.name.get_or_insert_with(|| only.name.clone());
                }
                Ok(OpenOutcome::Opened(only.pid))
            }
            many => {
                let ids: Vec<ProcessId> = many.iter().map(|p| p.pid).collect();
                debug!(name, ?ids, "ambiguous process name");
                Ok(OpenOutcome::Ambiguous(ids))
            }
        }
    }

    /// Attaches an already opened backend, closing any current target first
    pub fn attach(&mut self, backend: Box<dyn ProcessMemory>) -> ProcessId {
        self.close();
        let pid = backend.pid();
        let name = backend.process_name();
        let window = backend.main_window();
        debug!(pid, name = name.as_deref().unwrap_or("?"), "attached to process");
        self.attached = Some(AttachedProcess {
            backend,
            pid,
            name,
            window,
        });
        pid
    }

    /// Releases the target; returns false if nothing was open
    pub fn close(&mut self) -> bool {
        match self.attached.take() {
            Some(attached) => {
                debug!(pid = attached.pid, "closed process");
                true
            }
            None => false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.attached.is_some()
    }

    pub fn pid(&self) -> Option<ProcessId> {
        self.attached.as_ref().map(|a| a.pid)
    }

    pub fn process_name(&self) -> Option<&str> {
        self.attached.as_ref().and_then(|a| a.name.as_deref())
    }

    pub fn main_window(&self) -> Option<usize> {
        self.attached.as_ref().and_then(|a| a.window)
    }

    /// True iff a target is open and still running
    pub fn available(&self) -> bool {
        self.attached
            .as_ref()
            .map_or(false, |a| a.backend.is_alive())
    }

    /// The open backend, whether or not the target is still alive
    pub fn backend(&self) -> MemoryResult<&dyn ProcessMemory> {
        self.attached
            .as_ref()
            .map(|a| a.backend.as_ref())
            .ok_or(MemoryError::NotAttached)
    }

    fn live_backend(&self) -> MemoryResult<&dyn ProcessMemory> {
        let backend = self.backend()?;
        if backend.is_alive() {
            Ok(backend)
        } else {
            Err(MemoryError::ProcessExited(backend.pid()))
        }
    }

    /// Reads `size` bytes, zero-filling whatever could not be copied
    ///
    /// Fails only when no target is open or the target has exited.
    pub fn read(&self, address: Address, size: usize) -> MemoryResult<Vec<u8>> {
        let backend = self.live_backend()?;
        let mut buffer = vec![0u8; size];
        match backend.read_memory(address, &mut buffer) {
            Ok(copied) if copied < size => {
                trace!(%address, size, copied, "short read");
                buffer[copied..].fill(0);
            }
            Ok(_) => {}
            Err(e) if e.is_target_unavailable() => return Err(e),
            Err(e) => {
                trace!(%address, size, error = %e, "read failed");
                buffer.fill(0);
            }
        }
        Ok(buffer)
    }

    /// Reads into `buffer`, returning exactly how many bytes were copied
    pub fn read_into(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        self.live_backend()?.read_memory(address, buffer)
    }

    /// Plain write; protection is left untouched
    pub fn write(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        self.live_backend()?.write_memory(address, data)
    }

    /// Writes into a region whose protection may forbid writing
    ///
    /// The region's protection is switched to its writable counterpart for
    /// the duration of the write and the previous protection is restored
    /// afterwards. Not safe against concurrent protection changes in the
    /// target.
    pub fn write_protected(
        &self,
        region: &MemoryRegion,
        address: Address,
        data: &[u8],
    ) -> MemoryResult<usize> {
        let backend = self.live_backend()?;
        if backend.writes_bypass_protection() {
            return backend.write_memory(address, data);
        }
        unprotect_for_operation(
            backend,
            region.base_address,
            region.size,
            region.protection,
            || backend.write_memory(address, data),
        )
    }

    /// Commits `size` bytes of read-write memory in the target
    pub fn allocate(&self, size: usize) -> MemoryResult<Address> {
        let address = self.live_backend()?.allocate(size)?;
        debug!(%address, size, "allocated memory");
        Ok(address)
    }

    /// Live description of the region containing `address`
    pub fn query_region(&self, address: Address) -> MemoryResult<MemoryRegion> {
        self.live_backend()?.query_region(address)
    }

    /// Enumerates regions below the configured ceiling
    ///
    /// By default only committed, unguarded regions outside system modules
    /// are returned; `include_all` returns every region the walk visits.
    pub fn regions(&self, include_all: bool) -> MemoryResult<Vec<MemoryRegion>> {
        let backend = self.live_backend()?;
        let walked: Vec<MemoryRegion> = RegionEnumerator::new(backend)
            .with_max_address(self.settings.max_address)
            .collect();

        let regions = if include_all {
            walked
        } else {
            let modules = backend.modules().unwrap_or_else(|e| {
                debug!(error = %e, "module list unavailable, skipping module filter");
                Vec::new()
            });
            RegionFilter::accessible(self.settings.module_filter.clone()).apply(walked, &modules)
        };

        debug!(count = regions.len(), include_all, "enumerated regions");
        Ok(regions)
    }

    pub fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        self.live_backend()?.modules()
    }

    /// Base address of a loaded module, matched case-insensitively by name
    pub fn module_base_address(&self, name: &str) -> MemoryResult<Option<Address>> {
        Ok(self
            .modules()?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .map(|m| m.base_address))
    }

    /// Suspends every thread of the target
    pub fn suspend(&self) -> MemoryResult<ThreadControl> {
        let outcome = self.live_backend()?.suspend()?;
        debug!(affected = outcome.affected, skipped = outcome.skipped, "suspended threads");
        Ok(outcome)
    }

    /// Resumes every thread of the target
    pub fn resume(&self) -> MemoryResult<ThreadControl> {
        let outcome = self.live_backend()?.resume()?;
        debug!(affected = outcome.affected, skipped = outcome.skipped, "resumed threads");
        Ok(outcome)
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl Drop for Memory {
    fn drop(&mut self) {
        self.close();
    }
}
