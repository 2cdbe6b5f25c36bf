//! Capability Audit Trail
//!
//! This module records every kernel object the simulated kernel creates or
//! destroys, and every semaphore signal, in the order they happened.
//!
//! ## Philosophy
//!
//! - Test-only: This is NOT production logging, it's for test verification
//! - Deterministic: Events carry a sequence number, not wall-clock time
//! - Queryable: Tests assert teardown ordering and leak freedom against it
//!
//! ## Example
//!
//! ```
//! use sim_kernel::capability_audit::{CapabilityAuditLog, KernelEvent};
//! use core_types::CapSel;
//! use kernel_api::ObjectKind;
//!
//! let mut audit_log = CapabilityAuditLog::new();
//! audit_log.record_event(KernelEvent::Created {
//!     sel: CapSel::new(0x10),
//!     kind: ObjectKind::Pd,
//! });
//! audit_log.record_event(KernelEvent::Revoked {
//!     sel: CapSel::new(0x10),
//!     kind: ObjectKind::Pd,
//! });
//!
//! assert_eq!(audit_log.len(), 2);
//! assert!(audit_log.has_event(|e| matches!(e, KernelEvent::Revoked { .. })));
//! ```

use core_types::CapSel;
use kernel_api::ObjectKind;

/// Something that happened inside the simulated kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelEvent {
    Created { sel: CapSel, kind: ObjectKind },
    Revoked { sel: CapSel, kind: ObjectKind },
    SemaphoreUp { sel: CapSel },
}

impl KernelEvent {
    /// Selector the event is about
    pub fn sel(&self) -> CapSel {
        match self {
            KernelEvent::Created { sel, .. }
            | KernelEvent::Revoked { sel, .. }
            | KernelEvent::SemaphoreUp { sel } => *sel,
        }
    }
}

/// A single audit event with its position in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityAuditEvent {
    pub seq: u64,
    pub event: KernelEvent,
}

/// Audit log for kernel object operations
#[derive(Debug, Clone, Default)]
pub struct CapabilityAuditLog {
    events: Vec<CapabilityAuditEvent>,
    next_seq: u64,
}

impl CapabilityAuditLog {
    /// Creates a new empty audit log
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_seq: 0,
        }
    }

    /// Appends an event
    pub fn record_event(&mut self, event: KernelEvent) {
        self.events.push(CapabilityAuditEvent {
            seq: self.next_seq,
            event,
        });
        self.next_seq += 1;
    }

    /// Returns all recorded events
    pub fn get_events(&self) -> &[CapabilityAuditEvent] {
        &self.events
    }

    /// Returns events about a specific selector
    pub fn get_events_for_sel(&self, sel: CapSel) -> Vec<&CapabilityAuditEvent> {
        self.events.iter().filter(|e| e.event.sel() == sel).collect()
    }

    /// Selectors revoked so far, in order, together with their kind
    pub fn revocations(&self) -> Vec<(CapSel, ObjectKind)> {
        self.events
            .iter()
            .filter_map(|e| match e.event {
                KernelEvent::Revoked { sel, kind } => Some((sel, kind)),
                _ => None,
            })
            .collect()
    }

    /// Counts events matching a predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&KernelEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(&e.event)).count()
    }

    /// Checks if any event matches the predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&KernelEvent) -> bool,
    {
        self.events.iter().any(|e| predicate(&e.event))
    }

    /// Sequence number of the first event matching the predicate
    pub fn position<F>(&self, predicate: F) -> Option<u64>
    where
        F: Fn(&KernelEvent) -> bool,
    {
        self.events
            .iter()
            .find(|e| predicate(&e.event))
            .map(|e| e.seq)
    }

    /// Clears all events (useful for test reset)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns the number of recorded events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Checks if the audit log is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
