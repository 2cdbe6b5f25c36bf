//! # Resources
//!
//! This crate provides the resource allocators the child manager hands out
//! to its children.
//!
//! ## Philosophy
//!
//! - **Resources are finite and must be explicit**
//! - **Quotas are enforced, not advisory**
//! - **Release is exact**: giving back something that was not handed out is a bug, not an error
//!
//! ## Core Concepts
//!
//! Process-wide allocators, shared by every child and safe to call from any
//! worker CPU:
//! - [`CapSelSpace`]: the manager's capability-selector space
//! - [`GsiSpace`]: the global system interrupt namespace
//! - [`PortSpace`]: the IO port space
//!
//! Per-child bookkeeping, guarded by the owning child's lock:
//! - [`RegionList`]: the child's virtual memory map
//! - [`PortManager`]: IO port ranges the child holds
//! - [`GsiBitmap`]: interrupt lines the child holds
//! - [`ChildQuota`]: limits on threads, sessions and regions
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A physical memory allocator
//! - A scheduling budget (quantum/priority are opaque here)

pub mod cap_space;
pub mod gsi;
pub mod ports;
mod range;
pub mod regions;

pub use cap_space::CapSelSpace;
pub use gsi::{GsiBitmap, GsiSpace};
pub use ports::{PortManager, PortRange, PortSpace};
pub use regions::{Region, RegionList};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of resource, used in errors and diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    CapSelectors,
    Gsis,
    IoPorts,
    VirtualMemory,
    Threads,
    Sessions,
    Regions,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::CapSelectors => "capability selectors",
            ResourceKind::Gsis => "GSIs",
            ResourceKind::IoPorts => "IO ports",
            ResourceKind::VirtualMemory => "virtual memory",
            ResourceKind::Threads => "threads",
            ResourceKind::Sessions => "sessions",
            ResourceKind::Regions => "regions",
        };
        f.write_str(name)
    }
}

/// Resource allocation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResourceError {
    /// Not enough of the resource left
    #[error("{resource} exhausted: requested {requested}, {available} available")]
    Exhausted {
        resource: ResourceKind,
        requested: u64,
        available: u64,
    },

    /// The specific range asked for is (partly) held by someone else
    #[error("{resource} {base:#x}+{count} is not available")]
    Unavailable {
        resource: ResourceKind,
        base: u64,
        count: u64,
    },

    /// The request lies outside the managed space
    #[error("{resource} {value:#x} is out of range")]
    OutOfRange { resource: ResourceKind, value: u64 },

    /// A per-child quota would be exceeded
    #[error("{resource} quota of {limit} reached")]
    QuotaExceeded { resource: ResourceKind, limit: usize },
}

/// Per-child resource quota
///
/// `None` means the resource is not limited beyond what the global
/// allocators can supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildQuota {
    pub max_threads: Option<usize>,
    pub max_sessions: Option<usize>,
    pub max_regions: Option<usize>,
}

impl ChildQuota {
    /// Creates a quota without limits
    pub fn unlimited() -> Self {
        Self {
            max_threads: None,
            max_sessions: None,
            max_regions: None,
        }
    }

    /// Builder: sets the thread limit
    pub fn with_max_threads(mut self, limit: usize) -> Self {
        self.max_threads = Some(limit);
        self
    }

    /// Builder: sets the session limit
    pub fn with_max_sessions(mut self, limit: usize) -> Self {
        self.max_sessions = Some(limit);
        self
    }

    /// Builder: sets the region limit
    pub fn with_max_regions(mut self, limit: usize) -> Self {
        self.max_regions = Some(limit);
        self
    }

    /// Checks whether one more item of `resource` fits, given `current` in use.
    pub fn check(&self, resource: ResourceKind, current: usize) -> Result<(), ResourceError> {
        let limit = match resource {
            ResourceKind::Threads => self.max_threads,
            ResourceKind::Sessions => self.max_sessions,
            ResourceKind::Regions => self.max_regions,
            _ => None,
        };
        match limit {
            Some(limit) if current >= limit => {
                Err(ResourceError::QuotaExceeded { resource, limit })
            }
            _ => Ok(()),
        }
    }
}

impl Default for ChildQuota {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl fmt::Display for ChildQuota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |limit: Option<usize>| match limit {
            Some(limit) => limit.to_string(),
            None => "-".to_string(),
        };
        write!(
            f,
            "ChildQuota[threads={}, sessions={}, regions={}]",
            show(self.max_threads),
            show(self.max_sessions),
            show(self.max_regions)
        )
    }
}
