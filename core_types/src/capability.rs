//! Capability selectors and scheduling parameters
//!
//! A capability selector names a slot in the manager's capability space.
//! Selectors are plain numbers; holding one means nothing until the kernel
//! has created an object at that slot.
//!
//! ## Example
//!
//! ```
//! use core_types::CapSel;
//!
//! let base = CapSel::new(0x100);
//! assert_eq!(base.offset(3), CapSel::new(0x103));
//! assert!(!CapSel::INVALID.is_valid());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A capability selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CapSel(u64);

impl CapSel {
    /// Selector that never names an object
    pub const INVALID: CapSel = CapSel(u64::MAX);

    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Returns the selector `n` slots after this one.
    pub fn offset(&self, n: u64) -> CapSel {
        CapSel(self.0 + n)
    }
}

impl fmt::Display for CapSel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "sel:{:#x}", self.0)
        } else {
            write!(f, "sel:invalid")
        }
    }
}

/// Quantum/priority descriptor of a scheduling context
///
/// Opaque to the child manager: the values are handed to the kernel as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qpd {
    pub quantum: u32,
    pub priority: u32,
}

impl Qpd {
    pub const fn new(quantum: u32, priority: u32) -> Self {
        Self { quantum, priority }
    }
}

impl Default for Qpd {
    fn default() -> Self {
        Self {
            quantum: 10_000,
            priority: 1,
        }
    }
}

impl fmt::Display for Qpd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q={} p={}", self.quantum, self.priority)
    }
}
