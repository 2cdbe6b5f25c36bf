//! Child lifecycle and teardown phases

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states for a child
///
/// `Created → Started → Running → Terminating → Destroyed`. A child that
/// fails to start goes straight from `Started` to `Destroyed` once its last
/// reference is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChildState {
    /// Registered, no address space yet
    Created,
    /// Address space exists, main thread not yet running
    Started,
    /// Main thread is running; all portal operations are accepted
    Running,
    /// Main thread has exited; waiting for the last reference to go away
    Terminating,
    /// All resources released
    Destroyed,
}

impl ChildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildState::Created => "created",
            ChildState::Started => "started",
            ChildState::Running => "running",
            ChildState::Terminating => "terminating",
            ChildState::Destroyed => "destroyed",
        }
    }

    /// Checks if the child owns an address space that operations may use
    pub fn is_active(&self) -> bool {
        matches!(self, ChildState::Started | ChildState::Running)
    }
}

impl fmt::Display for ChildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Teardown phases, in the order they run
///
/// Portals go first so that no new call can enter the child. Threads go
/// before regions because a running thread may still touch its stack, and
/// the address space goes last because every other object lives in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TeardownPhase {
    Portals,
    Threads,
    Regions,
    Ports,
    Gsis,
    Sessions,
    AddressSpace,
    Done,
}

impl TeardownPhase {
    /// Phase that runs after this one
    pub fn next(&self) -> TeardownPhase {
        match self {
            TeardownPhase::Portals => TeardownPhase::Threads,
            TeardownPhase::Threads => TeardownPhase::Regions,
            TeardownPhase::Regions => TeardownPhase::Ports,
            TeardownPhase::Ports => TeardownPhase::Gsis,
            TeardownPhase::Gsis => TeardownPhase::Sessions,
            TeardownPhase::Sessions => TeardownPhase::AddressSpace,
            TeardownPhase::AddressSpace | TeardownPhase::Done => TeardownPhase::Done,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownPhase::Portals => "portals",
            TeardownPhase::Threads => "threads",
            TeardownPhase::Regions => "regions",
            TeardownPhase::Ports => "ports",
            TeardownPhase::Gsis => "gsis",
            TeardownPhase::Sessions => "sessions",
            TeardownPhase::AddressSpace => "address space",
            TeardownPhase::Done => "done",
        }
    }
}
