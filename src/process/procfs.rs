//! Linux process backend over `/proc`
//!
//! Memory is accessed through `/proc/<pid>/mem` and regions come from
//! `/proc/<pid>/maps`, re-read on every query so the view is always live.
//! The kernel lets a tracer-privileged writer ignore page protection, so
//! protection changes are not needed (and not supported) here. Suspend and
//! resume stop and continue the whole thread group with signals.

use crate::core::types::{
    Address, MemoryError, MemoryResult, ModuleInfo, ProcessId, ProcessInfo, ThreadControl,
};
use crate::memory::backend::ProcessMemory;
use crate::memory::regions::{locate_region, MemoryRegion, ProtectionFlags, RegionType};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry<'a> {
    pub start: usize,
    pub end: usize,
    pub flags: &'a str,
    pub offset: usize,
    pub pathname: &'a str,
}

impl MapEntry<'_> {
    fn flag(&self, index: usize, expected: u8) -> bool {
        self.flags.as_bytes().get(index) == Some(&expected)
    }

    pub fn protection(&self) -> ProtectionFlags {
        ProtectionFlags::from_rwx(self.flag(0, b'r'), self.flag(1, b'w'), self.flag(2, b'x'))
    }

    pub fn to_region(&self) -> MemoryRegion {
        let region_type = if self.flag(3, b's') {
            RegionType::Mapped
        } else if self.pathname.starts_with('/') {
            RegionType::Image
        } else {
            RegionType::Private
        };
        MemoryRegion::committed(Address::new(self.start), self.end - self.start, self.protection())
            .with_type(region_type)
    }
}

/// Iterator over the lines of a maps file
pub struct MapIter<'a>(std::str::Lines<'a>);

impl<'a> MapIter<'a> {
    pub fn new(contents: &'a str) -> Self {
        Self(contents.lines())
    }
}

impl<'a> Iterator for MapIter<'a> {
    type Item = MapEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.0.next()?;
        let mut split = line.splitn(6, ' ');
        let mut range = split.next()?.split('-');
        let start = usize::from_str_radix(range.next()?, 16).ok()?;
        let end = usize::from_str_radix(range.next()?, 16).ok()?;
        let flags = split.next()?;
        let offset = usize::from_str_radix(split.next()?, 16).ok()?;
        let _dev = split.next()?;
        let _inode = split.next()?;
        let pathname = split.next().unwrap_or("").trim_start();

        Some(MapEntry {
            start,
            end,
            flags,
            offset,
            pathname,
        })
    }
}

/// Groups file-backed mappings by path into modules
pub fn modules_from_maps(contents: &str) -> Vec<ModuleInfo> {
    let mut spans: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for entry in MapIter::new(contents).filter(|e| e.pathname.starts_with('/')) {
        let span = spans.entry(entry.pathname).or_insert((entry.start, entry.end));
        span.0 = span.0.min(entry.start);
        span.1 = span.1.max(entry.end);
    }

    let mut modules: Vec<ModuleInfo> = spans
        .into_iter()
        .map(|(path, (start, end))| {
            let name = Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ModuleInfo::new(name, path, Address::new(start), end - start)
        })
        .collect();
    modules.sort_by_key(|m| m.base_address);
    modules
}

fn proc_path(pid: ProcessId, leaf: &str) -> PathBuf {
    PathBuf::from(format!("/proc/{}/{}", pid, leaf))
}

fn map_open_error(pid: ProcessId, e: std::io::Error) -> MemoryError {
    match e.kind() {
        std::io::ErrorKind::NotFound => MemoryError::ProcessNotFound(format!("PID: {}", pid)),
        std::io::ErrorKind::PermissionDenied => MemoryError::access_denied(pid, e.to_string()),
        _ => MemoryError::IoError(e),
    }
}

/// Executable name of `pid`, falling back to its (truncated) `comm`
pub fn process_name(pid: ProcessId) -> Option<String> {
    fs::read_link(proc_path(pid, "exe"))
        .ok()
        .and_then(|exe| exe.file_name().map(|n| n.to_string_lossy().into_owned()))
        .or_else(|| {
            fs::read_to_string(proc_path(pid, "comm"))
                .ok()
                .map(|comm| comm.trim_end().to_string())
        })
}

/// Every process visible under `/proc`
pub fn enumerate_processes() -> MemoryResult<Vec<ProcessInfo>> {
    let mut processes = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let Ok(entry) = entry else { continue };
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<ProcessId>().ok())
        else {
            continue;
        };
        if let Some(name) = process_name(pid) {
            processes.push(ProcessInfo::new(pid, name));
        }
    }
    Ok(processes)
}

fn signal(pid: ProcessId, signal: libc::c_int) -> MemoryResult<()> {
    let result = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(MemoryError::last_os_error())
    }
}

/// Sends SIGKILL to `pid`
pub fn terminate(pid: ProcessId) -> MemoryResult<()> {
    signal(pid, libc::SIGKILL)
}

/// A process opened through procfs
#[derive(Debug)]
pub struct ProcfsProcess {
    pid: ProcessId,
    name: Option<String>,
    mem: File,
    writable: bool,
}

impl ProcfsProcess {
    /// Opens `/proc/<pid>/mem`, read-write when permitted
    pub fn open(pid: ProcessId) -> MemoryResult<Self> {
        let path = proc_path(pid, "mem");
        let (mem, writable) = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => (file, true),
            Err(_) => (File::open(&path).map_err(|e| map_open_error(pid, e))?, false),
        };
        debug!(pid, writable, "opened procfs process");
        Ok(ProcfsProcess {
            pid,
            name: process_name(pid),
            mem,
            writable,
        })
    }

    fn maps(&self) -> MemoryResult<String> {
        fs::read_to_string(proc_path(self.pid, "maps")).map_err(|e| map_open_error(self.pid, e))
    }

    fn parsed_maps(&self) -> MemoryResult<Vec<MemoryRegion>> {
        let maps = self.maps()?;
        Ok(MapIter::new(&maps).map(|e| e.to_region()).collect())
    }

    fn thread_count(&self) -> usize {
        fs::read_dir(proc_path(self.pid, "task")).map_or(0, |dir| dir.count())
    }
}

impl ProcessMemory for ProcfsProcess {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn process_name(&self) -> Option<String> {
        self.name.clone()
    }

    fn read_memory(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
        let mut copied = 0;
        while copied < buffer.len() {
            match self
                .mem
                .read_at(&mut buffer[copied..], (address.as_usize() + copied) as u64)
            {
                Ok(0) => break,
                Ok(n) => copied += n,
                Err(e) if copied == 0 => return Err(MemoryError::read_failed(address, e.to_string())),
                Err(e) => {
                    trace!(%address, copied, error = %e, "read stopped early");
                    break;
                }
            }
        }
        if copied == 0 && !buffer.is_empty() {
            return Err(MemoryError::read_failed(address, "no bytes copied"));
        }
        Ok(copied)
    }

    fn write_memory(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
        if !self.writable {
            return Err(MemoryError::write_failed(address, "process memory opened read-only"));
        }
        let mut written = 0;
        while written < data.len() {
            match self
                .mem
                .write_at(&data[written..], (address.as_usize() + written) as u64)
            {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if written == 0 => {
                    return Err(MemoryError::write_failed(address, e.to_string()))
                }
                Err(_) => break,
            }
        }
        Ok(written)
    }

    fn query_region(&self, address: Address) -> MemoryResult<MemoryRegion> {
        locate_region(&self.parsed_maps()?, address)
    }

    fn mapped_regions(&self) -> MemoryResult<Option<Vec<MemoryRegion>>> {
        self.parsed_maps().map(Some)
    }

    fn protect(
        &self,
        _address: Address,
        _size: usize,
        _protection: ProtectionFlags,
    ) -> MemoryResult<ProtectionFlags> {
        Err(MemoryError::UnsupportedOperation(
            "changing protection of another process".to_string(),
        ))
    }

    fn allocate(&self, _size: usize) -> MemoryResult<Address> {
        Err(MemoryError::UnsupportedOperation(
            "allocating memory in another process".to_string(),
        ))
    }

    fn is_alive(&self) -> bool {
        // A zombie still has a /proc entry but no address space
        fs::read_to_string(proc_path(self.pid, "stat"))
            .ok()
            .and_then(|stat| {
                let state = stat.rsplit_once(')')?.1.trim_start().chars().next()?;
                Some(state != 'Z' && state != 'X')
            })
            .unwrap_or(false)
    }

    fn modules(&self) -> MemoryResult<Vec<ModuleInfo>> {
        Ok(modules_from_maps(&self.maps()?))
    }

    fn suspend(&self) -> MemoryResult<ThreadControl> {
        signal(self.pid, libc::SIGSTOP)?;
        Ok(ThreadControl {
            affected: self.thread_count(),
            skipped: 0,
        })
    }

    fn resume(&self) -> MemoryResult<ThreadControl> {
        signal(self.pid, libc::SIGCONT)?;
        Ok(ThreadControl {
            affected: self.thread_count(),
            skipped: 0,
        })
    }

    fn writes_bypass_protection(&self) -> bool {
        true
    }
}
