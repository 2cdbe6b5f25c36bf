//! Test utilities for resilience testing
//!
//! This module provides helper functions for writing integration tests
//! against the simulated kernel.

use crate::fault_injection::FaultPlan;
use crate::SimulatedKernel;
use core_types::{CapSel, CpuId};
use kernel_api::{KernelApi, KernelError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// First selector of the range reserved for test-owned objects
///
/// Objects a test creates directly (join semaphores, service portals) live
/// here so they never collide with selectors handed out by the manager.
pub const TEST_SEL_BASE: u64 = 0xF000_0000;

static NEXT_TEST_SEL: AtomicU64 = AtomicU64::new(TEST_SEL_BASE);

/// Hands out a fresh selector from the test-owned range
pub fn next_test_sel() -> CapSel {
    CapSel::new(NEXT_TEST_SEL.fetch_add(1, Ordering::Relaxed))
}

/// Creates a shared kernel with a fault plan installed
pub fn kernel_with_fault_plan(plan: FaultPlan) -> Arc<SimulatedKernel> {
    Arc::new(SimulatedKernel::new().with_fault_plan(plan))
}

/// Creates a semaphore with count zero, as a joining thread would
pub fn create_test_semaphore(kernel: &SimulatedKernel) -> Result<CapSel, KernelError> {
    let sel = next_test_sel();
    kernel.create_sm(sel, 0)?;
    Ok(sel)
}

/// Creates a portal a test service can be registered under
pub fn create_test_portal(kernel: &SimulatedKernel) -> Result<CapSel, KernelError> {
    let sel = next_test_sel();
    kernel.create_pt(sel, CpuId(0), 0)?;
    Ok(sel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_injection::ObjectFault;
    use kernel_api::ObjectKind;

    #[test]
    fn test_selectors_are_unique_and_reserved() {
        let a = next_test_sel();
        let b = next_test_sel();
        assert_ne!(a, b);
        assert!(a.raw() >= TEST_SEL_BASE);
    }

    #[test]
    fn test_create_test_semaphore() {
        let kernel = SimulatedKernel::new();
        let sm = create_test_semaphore(&kernel).unwrap();
        assert_eq!(kernel.object_kind(sm), Some(ObjectKind::Sm));
        assert_eq!(kernel.semaphore_count(sm), Some(0));
    }

    #[test]
    fn test_kernel_with_fault_plan() {
        let kernel = kernel_with_fault_plan(FaultPlan::new().with_object_fault(
            ObjectFault::FailNextCreate {
                kind: Some(ObjectKind::Pt),
                count: 1,
            },
        ));
        assert!(create_test_portal(&kernel).is_err());
        assert!(create_test_portal(&kernel).is_ok());
    }
}
