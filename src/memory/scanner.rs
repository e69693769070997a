//! Signature scanning across the regions of an opened target
//!
//! [`SigScanner`] snapshots the accessible regions once, then reads each
//! region in bounded chunks and runs the [`Signature`] matcher over every
//! chunk. Consecutive chunks of one region overlap by `pattern_len - 1`
//! bytes so a match straddling a chunk boundary is seen exactly once.
//!
//! Lifecycle events are delivered synchronously on the scanning thread to
//! every subscribed listener. A scan that fails input validation emits a
//! single [`ScanEvent::Error`] and no begin/end pair; every other scan is
//! bracketed by [`ScanEvent::Begin`] and [`ScanEvent::End`].

use crate::core::types::{Address, MemoryError, MemoryResult};
use crate::memory::accessor::Memory;
use crate::memory::pattern::Signature;
use crate::memory::regions::MemoryRegion;
use crate::memory::walker::MemoryWalker;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default upper bound for a single chunk read (16 MiB)
pub const DEFAULT_MAX_READ_SIZE: usize = 16 * 1024 * 1024;

/// Whether a scan stops at the first hit or records every hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ScanMode {
    #[default]
    FirstMatch,
    AllMatches,
}

/// Options for signature scanning
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Largest chunk read from the target at once
    pub max_read_size: usize,
    pub mode: ScanMode,
    /// Scan every enumerated region instead of the accessible subset
    pub include_all_regions: bool,
    /// Worker threads used when re-verifying recorded matches
    pub verify_threads: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            max_read_size: DEFAULT_MAX_READ_SIZE,
            mode: ScanMode::FirstMatch,
            include_all_regions: false,
            verify_threads: num_cpus::get().min(8),
        }
    }
}

impl ScanOptions {
    pub fn all_matches() -> Self {
        ScanOptions {
            mode: ScanMode::AllMatches,
            ..ScanOptions::default()
        }
    }
}

/// Reasons a scan reports through its error channel
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ScanError {
    #[error("The mask is bad: pattern has {pattern_len} bytes, mask has {mask_len}")]
    BadMask { pattern_len: usize, mask_len: usize },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Couldn't read region at {base}: region size was 0")]
    EmptyRegion { base: Address },

    #[error("No match for signature. Check signature, mask and regions.")]
    NoMatch,

    #[error("Target unavailable: {0}")]
    TargetUnavailable(String),

    #[error("{0}")]
    Os(String),
}

impl From<MemoryError> for ScanError {
    fn from(error: MemoryError) -> Self {
        match error {
            MemoryError::BadMask {
                pattern_len,
                mask_len,
            } => ScanError::BadMask {
                pattern_len,
                mask_len,
            },
            MemoryError::InvalidPattern(reason) => ScanError::InvalidPattern(reason),
            other if other.is_target_unavailable() => {
                ScanError::TargetUnavailable(other.to_string())
            }
            other => ScanError::Os(other.to_string()),
        }
    }
}

/// Notification emitted while a scan runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScanEvent {
    Begin,
    End,
    /// Emitted before each chunk with the number of hits in the current pass
    Progress { found: usize },
    /// First-match mode hit
    Found(Address),
    Error(ScanError),
}

/// How a scan finished
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScanOutcome {
    /// First-match mode hit at this address
    Found(Address),
    /// All-matches mode finished; `matches` counts this pass's hits, not the whole map
    Completed { matches: usize },
    NotFound,
    Cancelled,
    Failed(ScanError),
}

impl ScanOutcome {
    /// The single-match address, if any
    pub fn address(&self) -> Option<Address> {
        match self {
            ScanOutcome::Found(address) => Some(*address),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ScanOutcome::Failed(_))
    }
}

/// Cooperative cancellation flag, checked before every chunk read
#[derive(Debug, Clone, Default)]
pub struct ScanCancel(Arc<AtomicBool>);

impl ScanCancel {
    pub fn new() -> Self {
        ScanCancel::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clears the flag so the token can be reused
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Position of the chunk loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanCursor {
    /// Start of the chunk being read
    pub position: Address,
    /// Size of the chunk being read
    pub read_size: usize,
    /// Bytes of the current region not yet covered by a chunk
    pub leftover: usize,
}

type Listener<'a> = Box<dyn FnMut(&ScanEvent) + Send + 'a>;

enum RegionScan {
    Continue,
    Stop(ScanOutcome),
}

/// Chunked signature scanner over one accessor
///
/// Not reentrant: one scan runs at a time per instance. The region list is
/// captured at construction and reused by every scan until
/// [`refresh_regions`](Self::refresh_regions) is called.
pub struct SigScanner<'a> {
    walker: MemoryWalker<'a>,
    options: ScanOptions,
    regions: Vec<MemoryRegion>,
    matches: BTreeMap<Address, MemoryRegion>,
    listeners: Vec<Listener<'a>>,
    cancel: Option<ScanCancel>,
    cursor: ScanCursor,
    last_read: Vec<u8>,
}

impl<'a> SigScanner<'a> {
    /// Creates a scanner and snapshots the target's regions
    pub fn new(memory: &'a Memory, options: ScanOptions) -> MemoryResult<Self> {
        let regions = memory.regions(options.include_all_regions)?;
        Ok(SigScanner::with_regions(memory, options, regions))
    }

    /// Creates a scanner over an explicit region list
    pub fn with_regions(
        memory: &'a Memory,
        options: ScanOptions,
        regions: Vec<MemoryRegion>,
    ) -> Self {
        debug!(regions = regions.len(), mode = ?options.mode, "scanner created");
        SigScanner {
            walker: MemoryWalker::new(memory),
            options,
            regions,
            matches: BTreeMap::new(),
            listeners: Vec::new(),
            cancel: None,
            cursor: ScanCursor::default(),
            last_read: Vec::new(),
        }
    }

    /// Registers a listener for scan events
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&ScanEvent) + Send + 'a,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn set_cancel(&mut self, cancel: ScanCancel) {
        self.cancel = Some(cancel);
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// Matches recorded in all-matches mode, keyed by absolute address
    pub fn matches(&self) -> &BTreeMap<Address, MemoryRegion> {
        &self.matches
    }

    pub fn take_matches(&mut self) -> BTreeMap<Address, MemoryRegion> {
        std::mem::take(&mut self.matches)
    }

    pub fn clear_matches(&mut self) {
        self.matches.clear();
    }

    pub fn cursor(&self) -> ScanCursor {
        self.cursor
    }

    /// The most recently read chunk
    pub fn last_read(&self) -> &[u8] {
        &self.last_read
    }

    /// Clears cursor state and the chunk buffer; recorded matches are kept
    pub fn reset(&mut self) {
        self.cursor = ScanCursor::default();
        self.last_read = Vec::new();
    }

    /// Re-snapshots the target's regions, returning how many were found
    pub fn refresh_regions(&mut self) -> MemoryResult<usize> {
        self.regions = self
            .walker
            .memory()
            .regions(self.options.include_all_regions)?;
        debug!(regions = self.regions.len(), "scanner regions refreshed");
        Ok(self.regions.len())
    }

    fn emit(&mut self, event: ScanEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Parses a hex pattern and optional mask, then scans
    pub fn scan_module(&mut self, pattern: &str, mask: Option<&str>) -> ScanOutcome {
        match Signature::parse(pattern, mask) {
            Ok(signature) => self.scan_signature(&signature),
            Err(e) => self.reject(e),
        }
    }

    /// Scans for raw pattern bytes with an optional mask
    pub fn scan_bytes(&mut self, pattern: Vec<u8>, mask: Option<&str>) -> ScanOutcome {
        match Signature::from_bytes(pattern, mask) {
            Ok(signature) => self.scan_signature(&signature),
            Err(e) => self.reject(e),
        }
    }

    fn reject(&mut self, error: MemoryError) -> ScanOutcome {
        let error = ScanError::from(error);
        debug!(%error, "scan rejected");
        self.emit(ScanEvent::Error(error.clone()));
        ScanOutcome::Failed(error)
    }

    /// Scans every region for `signature`
    pub fn scan_signature(&mut self, signature: &Signature) -> ScanOutcome {
        debug!(
            pattern = %signature,
            exact = signature.is_exact(),
            regions = self.regions.len(),
            "scan started"
        );
        self.emit(ScanEvent::Begin);
        self.reset();

        let regions = self.regions.clone();
        let mut hits = 0usize;
        let mut outcome = None;
        for region in &regions {
            if let RegionScan::Stop(stop) = self.scan_region(region, signature, &mut hits) {
                outcome = Some(stop);
                break;
            }
        }

        let outcome = outcome.unwrap_or_else(|| {
            if hits > 0 {
                ScanOutcome::Completed { matches: hits }
            } else {
                self.emit(ScanEvent::Error(ScanError::NoMatch));
                ScanOutcome::NotFound
            }
        });

        if let ScanOutcome::Failed(error) = &outcome {
            self.emit(ScanEvent::Error(error.clone()));
        }
        self.emit(ScanEvent::End);
        debug!(?outcome, "scan finished");
        outcome
    }

    fn scan_region(
        &mut self,
        region: &MemoryRegion,
        signature: &Signature,
        hits: &mut usize,
    ) -> RegionScan {
        if region.size == 0 {
            return RegionScan::Stop(ScanOutcome::Failed(ScanError::EmptyRegion {
                base: region.base_address,
            }));
        }

        let overlap = signature.len() - 1;
        let chunk_size = self.options.max_read_size.max(signature.len());
        let mut offset = 0usize;

        loop {
            if self.cancel.as_ref().map_or(false, ScanCancel::is_cancelled) {
                debug!("scan cancelled");
                return RegionScan::Stop(ScanOutcome::Cancelled);
            }

            let read_size = chunk_size.min(region.size - offset);
            let position = region.base_address + offset;
            self.cursor = ScanCursor {
                position,
                read_size,
                leftover: region.size - offset - read_size,
            };
            self.emit(ScanEvent::Progress { found: *hits });

            self.last_read = match self.walker.memory().read(position, read_size) {
                Ok(chunk) => chunk,
                Err(e) => return RegionScan::Stop(ScanOutcome::Failed(e.into())),
            };
            trace!(%position, read_size, "chunk read");

            if self.last_read.iter().any(|&b| b != 0) {
                match self.options.mode {
                    ScanMode::FirstMatch => {
                        if let Some(index) = signature.find_first(&self.last_read) {
                            let address = position + index;
                            self.emit(ScanEvent::Found(address));
                            return RegionScan::Stop(ScanOutcome::Found(address));
                        }
                    }
                    ScanMode::AllMatches => {
                        for index in signature.find_all(&self.last_read) {
                            self.matches.insert(position + index, *region);
                            *hits += 1;
                        }
                    }
                }
            }

            if offset + read_size >= region.size {
                return RegionScan::Continue;
            }
            offset += read_size - overlap;
        }
    }

    /// Re-reads every recorded match in parallel and returns those that still match
    ///
    /// A match that can no longer be read in full is treated as stale.
    pub fn verify_matches(&self, signature: &Signature) -> Vec<Address> {
        let memory = self.walker.memory();
        let addresses: Vec<Address> = self.matches.keys().copied().collect();
        let still_matches = |address: &Address| {
            let mut bytes = vec![0u8; signature.len()];
            match memory.read_into(*address, &mut bytes) {
                Ok(copied) if copied == bytes.len() => signature.matches_at(&bytes, 0),
                _ => false,
            }
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.verify_threads.max(1))
            .build()
        {
            Ok(pool) => pool.install(|| {
                addresses
                    .par_iter()
                    .filter(|address| still_matches(address))
                    .copied()
                    .collect()
            }),
            Err(e) => {
                warn!(error = %e, "verify pool unavailable, verifying sequentially");
                addresses.into_iter().filter(|a| still_matches(a)).collect()
            }
        }
    }

    /// Drops recorded matches that no longer hold `signature`, returning how many were removed
    pub fn retain_verified(&mut self, signature: &Signature) -> usize {
        let keep = self.verify_matches(signature);
        let before = self.matches.len();
        self.matches = keep
            .into_iter()
            .filter_map(|address| self.matches.get(&address).map(|r| (address, *r)))
            .collect();
        let removed = before - self.matches.len();
        debug!(removed, kept = self.matches.len(), "verified matches");
        removed
    }
}
