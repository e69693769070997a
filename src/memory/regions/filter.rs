//! Memory region filtering functionality

use crate::core::types::ModuleInfo;
use crate::memory::regions::MemoryRegion;
use std::fmt;
use std::sync::Arc;

/// Path fragment identifying OS-owned modules on this platform
#[cfg(windows)]
pub const DEFAULT_SYSTEM_FRAGMENT: &str = "Windows";
#[cfg(not(windows))]
pub const DEFAULT_SYSTEM_FRAGMENT: &str = "/usr/lib";

/// Decides which loaded modules count as OS-owned noise
///
/// This is a coarse heuristic used to hide system libraries from region
/// enumeration. It is not a security boundary.
#[derive(Clone)]
pub enum ModuleFilter {
    /// No module is treated as a system module
    Disabled,
    /// Modules whose path contains the fragment (case-insensitive)
    PathFragment(String),
    /// Caller-supplied predicate
    Custom(Arc<dyn Fn(&ModuleInfo) -> bool + Send + Sync>),
}

impl ModuleFilter {
    /// Filter matching paths that contain `fragment`
    pub fn path_fragment(fragment: impl Into<String>) -> Self {
        ModuleFilter::PathFragment(fragment.into())
    }

    /// Filter using an arbitrary predicate
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&ModuleInfo) -> bool + Send + Sync + 'static,
    {
        ModuleFilter::Custom(Arc::new(predicate))
    }

    /// True if `module` is a system module
    pub fn is_system_module(&self, module: &ModuleInfo) -> bool {
        match self {
            ModuleFilter::Disabled => false,
            ModuleFilter::PathFragment(fragment) => module
                .path
                .to_string_lossy()
                .to_lowercase()
                .contains(&fragment.to_lowercase()),
            ModuleFilter::Custom(predicate) => predicate(module),
        }
    }
}

impl Default for ModuleFilter {
    fn default() -> Self {
        ModuleFilter::path_fragment(DEFAULT_SYSTEM_FRAGMENT)
    }
}

impl fmt::Debug for ModuleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFilter::Disabled => f.write_str("Disabled"),
            ModuleFilter::PathFragment(fragment) => {
                f.debug_tuple("PathFragment").field(fragment).finish()
            }
            ModuleFilter::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Filter for enumerated memory regions
#[derive(Debug, Clone)]
pub struct RegionFilter {
    /// Include only committed memory
    pub committed_only: bool,
    /// Exclude pages carrying the guard flag
    pub exclude_guarded: bool,
    /// Exclude regions starting inside system modules
    pub module_filter: ModuleFilter,
}

impl RegionFilter {
    /// The default accessible-region filter
    pub fn accessible(module_filter: ModuleFilter) -> Self {
        RegionFilter {
            committed_only: true,
            exclude_guarded: true,
            module_filter,
        }
    }

    /// A filter that lets every region through
    pub fn include_all() -> Self {
        RegionFilter {
            committed_only: false,
            exclude_guarded: false,
            module_filter: ModuleFilter::Disabled,
        }
    }

    /// Apply the filter to a list of regions
    pub fn apply(&self, regions: Vec<MemoryRegion>, modules: &[ModuleInfo]) -> Vec<MemoryRegion> {
        let system: Vec<&ModuleInfo> = modules
            .iter()
            .filter(|m| self.module_filter.is_system_module(m))
            .collect();

        regions
            .into_iter()
            .filter(|region| self.matches(region, &system))
            .collect()
    }

    /// Check if a region passes the filter given the system modules in play
    pub fn matches(&self, region: &MemoryRegion, system_modules: &[&ModuleInfo]) -> bool {
        if self.committed_only && !region.is_committed() {
            return false;
        }

        if self.exclude_guarded && region.is_guarded() {
            return false;
        }

        !system_modules
            .iter()
            .any(|m| m.contains_address(region.base_address))
    }
}

impl Default for RegionFilter {
    fn default() -> Self {
        RegionFilter::accessible(ModuleFilter::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Address;
    use crate::memory::regions::{ProtectionFlags, RegionState};

    fn module(path: &str, base: usize, size: usize) -> ModuleInfo {
        ModuleInfo::new("m", path, Address::new(base), size)
    }

    fn committed(base: usize, size: usize) -> MemoryRegion {
        MemoryRegion::committed(Address::new(base), size, ProtectionFlags::read_write())
    }

    #[test]
    fn test_path_fragment() {
        let filter = ModuleFilter::path_fragment("Windows");
        assert!(filter.is_system_module(&module("C:\\WINDOWS\\System32\\ntdll.dll", 0, 1)));
        assert!(!filter.is_system_module(&module("C:\\Games\\game.exe", 0, 1)));
        assert!(!ModuleFilter::Disabled.is_system_module(&module("C:\\Windows\\x.dll", 0, 1)));
    }

    #[test]
    fn test_custom_filter() {
        let filter = ModuleFilter::custom(|m| m.base_address.as_usize() >= 0x7000_0000);
        assert!(filter.is_system_module(&module("a", 0x7000_0000, 1)));
        assert!(!filter.is_system_module(&module("a", 0x1000, 1)));
    }

    #[test]
    fn test_accessible_filter() {
        let modules = vec![
            module("C:\\Windows\\System32\\kernel32.dll", 0x10000, 0x10000),
            module("C:\\Games\\game.exe", 0x40000, 0x10000),
        ];
        let mut guarded = committed(0x3000, 0x1000);
        guarded.protection = ProtectionFlags::read_write().with_guard();
        let mut reserved = committed(0x5000, 0x1000);
        reserved.state = RegionState::Reserved;

        let regions = vec![
            committed(0x1000, 0x1000),
            guarded,
            reserved,
            committed(0x11000, 0x1000),
            committed(0x41000, 0x1000),
        ];

        let kept = RegionFilter::accessible(ModuleFilter::path_fragment("Windows"))
            .apply(regions.clone(), &modules);
        let bases: Vec<usize> = kept.iter().map(|r| r.base_address.as_usize()).collect();
        assert_eq!(bases, vec![0x1000, 0x41000]);

        let all = RegionFilter::include_all().apply(regions, &modules);
        assert_eq!(all.len(), 5);
    }
}
