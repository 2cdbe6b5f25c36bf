//! Kernel API trait and kernel object kinds

use crate::KernelError;
use core_types::{CapSel, CpuId, Qpd};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of kernel object living at a capability selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Protection domain (address-space container)
    Pd,
    /// Execution context
    Ec,
    /// Scheduling context
    Sc,
    /// Portal (cross-domain call entry)
    Pt,
    /// Semaphore
    Sm,
    /// Memory backing for a region
    Memory,
    /// Client session with a service
    Session,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Pd => "pd",
            ObjectKind::Ec => "ec",
            ObjectKind::Sc => "sc",
            ObjectKind::Pt => "pt",
            ObjectKind::Sm => "sm",
            ObjectKind::Memory => "memory",
            ObjectKind::Session => "session",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kernel API trait
///
/// This is the capability-invocation interface the child manager consumes.
/// Every `create_*` call names the selector at which the new object is
/// placed; the caller obtains that selector from its own selector allocator
/// beforehand and owns it afterwards.
///
/// Implementations are shared by all worker CPUs of the manager, so every
/// method takes `&self` and the implementation synchronizes internally.
///
/// # Example
///
/// ```
/// use core_types::CapSel;
/// use kernel_api::{KernelApi, KernelError};
///
/// fn make_signal<K: KernelApi + ?Sized>(kernel: &K, sel: CapSel) -> Result<(), KernelError> {
///     kernel.create_sm(sel, 0)?;
///     kernel.sm_up(sel)?;
///     kernel.sm_down(sel)
/// }
/// ```
pub trait KernelApi: Send + Sync {
    /// Creates a protection domain (the child's address space and capability space)
    fn create_pd(&self, sel: CapSel, name: &str) -> Result<(), KernelError>;

    /// Creates an execution context inside `pd`, bound to `cpu`, with its
    /// UTCB at `utcb`
    fn create_ec(&self, sel: CapSel, pd: CapSel, cpu: CpuId, utcb: usize)
        -> Result<(), KernelError>;

    /// Creates a scheduling context that makes `ec` runnable on `cpu`
    fn create_sc(
        &self,
        sel: CapSel,
        ec: CapSel,
        pd: CapSel,
        cpu: CpuId,
        qpd: Qpd,
    ) -> Result<(), KernelError>;

    /// Creates a portal on `cpu` whose calls carry `badge`
    fn create_pt(&self, sel: CapSel, cpu: CpuId, badge: u64) -> Result<(), KernelError>;

    /// Creates a semaphore with the given initial count
    fn create_sm(&self, sel: CapSel, initial: u32) -> Result<(), KernelError>;

    /// Creates `size` bytes of anonymous memory backing
    fn create_memory(&self, sel: CapSel, size: usize) -> Result<(), KernelError>;

    /// Opens a session at the service reachable through `service_portal`
    fn open_session(&self, sel: CapSel, service_portal: CapSel, args: &str)
        -> Result<(), KernelError>;

    /// Increments a semaphore, waking one waiter
    fn sm_up(&self, sel: CapSel) -> Result<(), KernelError>;

    /// Decrements a semaphore, blocking the calling thread while it is zero
    fn sm_down(&self, sel: CapSel) -> Result<(), KernelError>;

    /// Destroys the object at `sel`; the selector becomes empty
    fn revoke(&self, sel: CapSel) -> Result<(), KernelError>;
}
