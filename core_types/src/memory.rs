//! # Memory Types
//!
//! Value types describing a child's virtual memory map.
//!
//! ## Key Types
//!
//! - [`MemoryPerms`]: Permission flags for memory regions (Read, Write, Execute)
//! - [`RegionKind`]: What a region of a child's address space is used for

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of one page
pub const PAGE_SIZE: usize = 0x1000;

/// Rounds `size` up to the next page boundary, or `None` if that
/// overflows.
pub fn checked_page_align_up(size: usize) -> Option<usize> {
    size.checked_add(PAGE_SIZE - 1).map(|end| end & !(PAGE_SIZE - 1))
}

/// Returns true if `value` is a multiple of the page size.
pub fn is_page_aligned(value: usize) -> bool {
    value & (PAGE_SIZE - 1) == 0
}

/// Memory permission flags
///
/// Permissions for memory regions follow the principle of least privilege.
/// By default, no permissions are granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryPerms {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl MemoryPerms {
    /// No permissions
    pub fn none() -> Self {
        Self {
            read: false,
            write: false,
            execute: false,
        }
    }

    /// Read-only permission
    pub fn read_only() -> Self {
        Self {
            read: true,
            write: false,
            execute: false,
        }
    }

    /// Read and write permissions
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            execute: false,
        }
    }

    /// Read and execute permissions (typical for code)
    pub fn read_execute() -> Self {
        Self {
            read: true,
            write: false,
            execute: true,
        }
    }

    /// Check if this has no permissions
    pub fn is_none(&self) -> bool {
        !self.read && !self.write && !self.execute
    }
}

impl fmt::Display for MemoryPerms {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { "R" } else { "-" },
            if self.write { "W" } else { "-" },
            if self.execute { "X" } else { "-" }
        )
    }
}

/// Purpose of a region in a child's virtual address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionKind {
    /// Thread stack, backed by anonymous memory
    Stack,
    /// User thread control block; kernel-managed, no backing capability
    Utcb,
    /// Read-only hypervisor information page
    Hip,
    /// Memory requested by the child at runtime
    Data,
}

impl RegionKind {
    /// Returns the kind name for display
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Stack => "stack",
            RegionKind::Utcb => "utcb",
            RegionKind::Hip => "hip",
            RegionKind::Data => "data",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_perms_display() {
        assert_eq!(format!("{}", MemoryPerms::none()), "---");
        assert_eq!(format!("{}", MemoryPerms::read_only()), "R--");
        assert_eq!(format!("{}", MemoryPerms::read_write()), "RW-");
        assert_eq!(format!("{}", MemoryPerms::read_execute()), "R-X");
    }

    #[test]
    fn test_memory_perms_none() {
        assert!(MemoryPerms::none().is_none());
        assert!(!MemoryPerms::read_only().is_none());
    }

    #[test]
    fn test_page_alignment() {
        assert_eq!(checked_page_align_up(0), Some(0));
        assert_eq!(checked_page_align_up(PAGE_SIZE), Some(PAGE_SIZE));
        assert_eq!(checked_page_align_up(PAGE_SIZE + 1), Some(2 * PAGE_SIZE));
        assert!(is_page_aligned(0x4000));
        assert!(!is_page_aligned(0x4001));
    }

    #[test]
    fn test_page_alignment_overflow() {
        let top = usize::MAX & !(PAGE_SIZE - 1);
        assert_eq!(checked_page_align_up(1), Some(PAGE_SIZE));
        assert_eq!(checked_page_align_up(top), Some(top));
        assert_eq!(checked_page_align_up(usize::MAX), None);
        assert_eq!(checked_page_align_up(usize::MAX - PAGE_SIZE + 2), None);
    }

    #[test]
    fn test_region_kind_names() {
        assert_eq!(RegionKind::Stack.as_str(), "stack");
        assert_eq!(format!("{}", RegionKind::Hip), "hip");
    }
}
