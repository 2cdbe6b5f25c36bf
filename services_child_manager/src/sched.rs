//! Scheduling entities and join records

use core_types::{CapSel, CpuId, Qpd, ThreadId};
use std::fmt;

/// Name the main thread's scheduling entity is registered under
pub const MAIN_THREAD_NAME: &str = "main";

/// One announced thread of a child
///
/// Created by `create_thread` (or by the start sequence for the main
/// thread) and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedEntity {
    pub thread_id: ThreadId,
    pub name: String,
    pub cpu: CpuId,
    pub qpd: Qpd,
    /// Scheduling context the manager created for the thread
    pub sc: CapSel,
}

impl fmt::Display for SchedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' on {} ({}) sc={}",
            self.thread_id, self.name, self.cpu, self.qpd, self.sc
        )
    }
}

/// A pending join: `signal` is raised when `thread_id` terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinItem {
    pub thread_id: ThreadId,
    pub signal: CapSel,
}

/// The child's primary execution context
///
/// Shared because diagnostics may hold it after the child dropped it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MainThread {
    pub thread_id: ThreadId,
    pub ec: CapSel,
    pub cpu: CpuId,
    pub entry: usize,
    pub stack: usize,
    pub utcb: usize,
}

/// What a child learns when one of its threads is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadGrant {
    pub sc: CapSel,
    pub stack: usize,
    pub utcb: usize,
}

/// Result of a thread termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadExit {
    /// An ordinary thread ended (or the call was a repeat)
    Thread,
    /// The main thread ended; the child is now terminating
    Main,
}

/// Result of recording a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// The thread was already gone and the signal has been raised
    Signaled,
    /// The signal will be raised when the thread terminates
    Pending,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sched_entity_display() {
        let se = SchedEntity {
            thread_id: ThreadId(0x1000),
            name: "worker".to_string(),
            cpu: CpuId(1),
            qpd: Qpd::new(100, 2),
            sc: CapSel::new(0x20),
        };
        assert_eq!(
            format!("{}", se),
            "Thread(0x1000) 'worker' on cpu1 (q=100 p=2) sc=sel:0x20"
        );
    }
}
