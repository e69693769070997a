//! Memory access and signature scanning for an opened target
//!
//! This module provides the platform-independent engine:
//! - The [`ProcessMemory`] backend seam and an in-memory implementation
//! - The [`Memory`] accessor with protection-override writes
//! - Region enumeration and filtering
//! - A typed cursor, the pattern matcher and the chunked signature scanner
//! - Typed scan results that round-trip through their canonical text form

pub mod accessor;
pub mod backend;
pub mod pattern;
pub mod regions;
pub mod scanner;
pub mod snapshot;
pub mod typed;
pub mod walker;

pub use accessor::{Memory, MemorySettings, OpenOutcome};
pub use backend::ProcessMemory;
pub use pattern::{locate_all, locate_first, masked_match_at, Signature};
pub use regions::{
    MemoryRegion, ModuleFilter, ProtectionFlags, RegionEnumerator, RegionFilter, RegionState,
    RegionType,
};
pub use scanner::{
    ScanCancel, ScanCursor, ScanError, ScanEvent, ScanMode, ScanOptions, ScanOutcome, SigScanner,
};
pub use snapshot::InMemoryProcess;
pub use typed::{refresh_all, MemoryAddress};
pub use walker::{MemoryWalker, Primitive};
