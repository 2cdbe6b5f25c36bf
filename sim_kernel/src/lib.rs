//! # Simulated Kernel
//!
//! This crate provides a simulated implementation of the kernel API.
//!
//! ## Purpose
//!
//! The simulated kernel allows testing the child manager without hardware:
//! - Runs under `cargo test`
//! - Real blocking semaphores, so join/terminate races are genuine
//! - Inspectable (live objects and an ordered audit trail are accessible)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! This is not a "toy" or "mock": it enforces the same selector rules a real
//! kernel does. Creating at an occupied selector fails, revoking an empty one
//! fails, and objects must reference live objects of the right kind.

pub mod capability_audit;
pub mod fault_injection;
pub mod test_utils;

use capability_audit::{CapabilityAuditLog, KernelEvent};
use core_types::{CapSel, CpuId, Qpd};
use fault_injection::{FaultInjector, FaultPlan};
use kernel_api::{KernelApi, KernelError, ObjectKind};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;

/// Number of CPUs a kernel built with [`SimulatedKernel::new`] reports
pub const DEFAULT_CPU_COUNT: usize = 4;

#[derive(Debug, Default)]
struct SemaphoreState {
    count: u32,
    waiters: usize,
    revoked: bool,
}

/// Counting semaphore
#[derive(Debug, Default)]
struct Semaphore {
    state: Mutex<SemaphoreState>,
    cond: Condvar,
}

impl Semaphore {
    fn new(initial: u32) -> Self {
        Self {
            state: Mutex::new(SemaphoreState {
                count: initial,
                ..SemaphoreState::default()
            }),
            cond: Condvar::new(),
        }
    }

    fn up(&self) {
        let mut state = self.state.lock();
        state.count += 1;
        self.cond.notify_one();
    }

    /// Returns false if the semaphore was revoked while waiting
    fn down(&self) -> bool {
        let mut state = self.state.lock();
        state.waiters += 1;
        while state.count == 0 && !state.revoked {
            self.cond.wait(&mut state);
        }
        state.waiters -= 1;
        if state.count == 0 {
            return false;
        }
        state.count -= 1;
        true
    }

    fn revoke(&self) {
        self.state.lock().revoked = true;
        self.cond.notify_all();
    }
}

#[derive(Debug, Clone)]
struct KernelObject {
    kind: ObjectKind,
    label: String,
}

struct KernelState {
    objects: HashMap<CapSel, KernelObject>,
    semaphores: HashMap<CapSel, Arc<Semaphore>>,
    audit: CapabilityAuditLog,
    faults: Option<FaultInjector>,
}

/// Simulated kernel state
///
/// One lock guards the object table; semaphore waits happen outside it so
/// a blocked `sm_down` never stalls other CPUs.
pub struct SimulatedKernel {
    cpu_count: usize,
    state: Mutex<KernelState>,
}

impl SimulatedKernel {
    /// Creates a new simulated kernel with [`DEFAULT_CPU_COUNT`] CPUs
    pub fn new() -> Self {
        Self::with_cpus(DEFAULT_CPU_COUNT)
    }

    /// Creates a new simulated kernel with `cpu_count` CPUs
    pub fn with_cpus(cpu_count: usize) -> Self {
        Self {
            cpu_count,
            state: Mutex::new(KernelState {
                objects: HashMap::new(),
                semaphores: HashMap::new(),
                audit: CapabilityAuditLog::new(),
                faults: None,
            }),
        }
    }

    /// Installs a fault plan
    ///
    /// Replaces any plan installed before.
    pub fn with_fault_plan(self, plan: FaultPlan) -> Self {
        self.state.lock().faults = Some(FaultInjector::new(plan));
        self
    }

    /// Installs a fault plan on a kernel that is already shared
    pub fn inject_faults(&self, plan: FaultPlan) {
        self.state.lock().faults = Some(FaultInjector::new(plan));
    }

    pub fn cpu_count(&self) -> usize {
        self.cpu_count
    }

    /// Number of objects currently alive
    pub fn live_object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Selectors of all live objects of `kind`, sorted
    pub fn live_objects_of(&self, kind: ObjectKind) -> Vec<CapSel> {
        let state = self.state.lock();
        let mut sels: Vec<CapSel> = state
            .objects
            .iter()
            .filter(|(_, obj)| obj.kind == kind)
            .map(|(sel, _)| *sel)
            .collect();
        sels.sort();
        sels
    }

    /// Returns true if an object lives at `sel`
    pub fn is_live(&self, sel: CapSel) -> bool {
        self.state.lock().objects.contains_key(&sel)
    }

    /// Kind of the object at `sel`
    pub fn object_kind(&self, sel: CapSel) -> Option<ObjectKind> {
        self.state.lock().objects.get(&sel).map(|obj| obj.kind)
    }

    /// Description the object was created with (pd name, session args, ...)
    pub fn object_label(&self, sel: CapSel) -> Option<String> {
        self.state.lock().objects.get(&sel).map(|obj| obj.label.clone())
    }

    /// Current count of the semaphore at `sel`
    pub fn semaphore_count(&self, sel: CapSel) -> Option<u32> {
        let sm = self.state.lock().semaphores.get(&sel).cloned()?;
        let count = sm.state.lock().count;
        Some(count)
    }

    /// Number of threads blocked in `sm_down` on `sel`
    pub fn semaphore_waiters(&self, sel: CapSel) -> usize {
        let sm = self.state.lock().semaphores.get(&sel).cloned();
        sm.map_or(0, |sm| sm.state.lock().waiters)
    }

    /// Snapshot of the audit trail
    pub fn audit_log(&self) -> CapabilityAuditLog {
        self.state.lock().audit.clone()
    }

    /// Clears the audit trail
    pub fn clear_audit_log(&self) {
        self.state.lock().audit.clear();
    }

    fn check_cpu(&self, cpu: CpuId) -> Result<(), KernelError> {
        if cpu.0 >= self.cpu_count {
            return Err(KernelError::InvalidCpu(cpu.0));
        }
        Ok(())
    }

    fn create(
        &self,
        sel: CapSel,
        kind: ObjectKind,
        label: String,
        requires: &[(CapSel, ObjectKind)],
    ) -> Result<MutexGuard<'_, KernelState>, KernelError> {
        let mut state = self.state.lock();
        if !sel.is_valid() {
            return Err(KernelError::InvalidCapability(sel));
        }
        if state.objects.contains_key(&sel) {
            return Err(KernelError::SelectorInUse(sel));
        }
        for (dep, dep_kind) in requires {
            match state.objects.get(dep) {
                Some(obj) if obj.kind == *dep_kind => {}
                _ => return Err(KernelError::InvalidCapability(*dep)),
            }
        }
        if let Some(faults) = state.faults.as_mut() {
            if faults.should_fail_create(kind) {
                return Err(KernelError::ResourceExhausted(format!(
                    "injected failure creating {}",
                    kind
                )));
            }
        }
        state.objects.insert(sel, KernelObject { kind, label });
        state.audit.record_event(KernelEvent::Created { sel, kind });
        Ok(state)
    }

    fn semaphore(&self, sel: CapSel) -> Result<Arc<Semaphore>, KernelError> {
        self.state
            .lock()
            .semaphores
            .get(&sel)
            .cloned()
            .ok_or(KernelError::InvalidCapability(sel))
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelApi for SimulatedKernel {
    fn create_pd(&self, sel: CapSel, name: &str) -> Result<(), KernelError> {
        self.create(sel, ObjectKind::Pd, name.to_string(), &[])?;
        Ok(())
    }

    fn create_ec(
        &self,
        sel: CapSel,
        pd: CapSel,
        cpu: CpuId,
        utcb: usize,
    ) -> Result<(), KernelError> {
        self.check_cpu(cpu)?;
        self.create(
            sel,
            ObjectKind::Ec,
            format!("{} utcb={:#x}", cpu, utcb),
            &[(pd, ObjectKind::Pd)],
        )?;
        Ok(())
    }

    fn create_sc(
        &self,
        sel: CapSel,
        ec: CapSel,
        _pd: CapSel,
        cpu: CpuId,
        qpd: Qpd,
    ) -> Result<(), KernelError> {
        // The ec may live in the child's own capability space, which is not
        // modelled, so only the selector and the CPU are checked.
        self.check_cpu(cpu)?;
        self.create(sel, ObjectKind::Sc, format!("{} {} {}", ec, cpu, qpd), &[])?;
        Ok(())
    }

    fn create_pt(&self, sel: CapSel, cpu: CpuId, badge: u64) -> Result<(), KernelError> {
        self.check_cpu(cpu)?;
        self.create(sel, ObjectKind::Pt, format!("{} badge={}", cpu, badge), &[])?;
        Ok(())
    }

    fn create_sm(&self, sel: CapSel, initial: u32) -> Result<(), KernelError> {
        let mut state = self.create(sel, ObjectKind::Sm, format!("initial={}", initial), &[])?;
        state
            .semaphores
            .insert(sel, Arc::new(Semaphore::new(initial)));
        Ok(())
    }

    fn create_memory(&self, sel: CapSel, size: usize) -> Result<(), KernelError> {
        if size == 0 {
            return Err(KernelError::ResourceExhausted(
                "zero-sized memory object".to_string(),
            ));
        }
        self.create(sel, ObjectKind::Memory, format!("{:#x} bytes", size), &[])?;
        Ok(())
    }

    fn open_session(
        &self,
        sel: CapSel,
        service_portal: CapSel,
        args: &str,
    ) -> Result<(), KernelError> {
        self.create(
            sel,
            ObjectKind::Session,
            args.to_string(),
            &[(service_portal, ObjectKind::Pt)],
        )?;
        Ok(())
    }

    fn sm_up(&self, sel: CapSel) -> Result<(), KernelError> {
        let sm = {
            let mut state = self.state.lock();
            let sm = state
                .semaphores
                .get(&sel)
                .cloned()
                .ok_or(KernelError::InvalidCapability(sel))?;
            state.audit.record_event(KernelEvent::SemaphoreUp { sel });
            sm
        };
        sm.up();
        Ok(())
    }

    fn sm_down(&self, sel: CapSel) -> Result<(), KernelError> {
        let sm = self.semaphore(sel)?;
        if sm.down() {
            Ok(())
        } else {
            Err(KernelError::InvalidCapability(sel))
        }
    }

    fn revoke(&self, sel: CapSel) -> Result<(), KernelError> {
        let sm = {
            let mut state = self.state.lock();
            let obj = state
                .objects
                .remove(&sel)
                .ok_or(KernelError::InvalidCapability(sel))?;
            state.audit.record_event(KernelEvent::Revoked {
                sel,
                kind: obj.kind,
            });
            state.semaphores.remove(&sel)
        };
        if let Some(sm) = sm {
            sm.revoke();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault_injection::ObjectFault;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_kernel_creation() {
        let kernel = SimulatedKernel::new();
        assert_eq!(kernel.cpu_count(), DEFAULT_CPU_COUNT);
        assert_eq!(kernel.live_object_count(), 0);
    }

    #[test]
    fn test_selector_in_use() {
        let kernel = SimulatedKernel::new();
        let sel = CapSel::new(0x10);
        kernel.create_pd(sel, "a").unwrap();
        assert_eq!(
            kernel.create_pd(sel, "b"),
            Err(KernelError::SelectorInUse(sel))
        );
        assert_eq!(kernel.object_label(sel), Some("a".to_string()));
    }

    #[test]
    fn test_revoke_empty_selector_fails() {
        let kernel = SimulatedKernel::new();
        let sel = CapSel::new(0x10);
        assert_eq!(kernel.revoke(sel), Err(KernelError::InvalidCapability(sel)));

        kernel.create_memory(sel, 0x1000).unwrap();
        kernel.revoke(sel).unwrap();
        assert!(!kernel.is_live(sel));
        assert_eq!(kernel.revoke(sel), Err(KernelError::InvalidCapability(sel)));
    }

    #[test]
    fn test_ec_requires_pd() {
        let kernel = SimulatedKernel::new();
        let pd = CapSel::new(1);
        let ec = CapSel::new(2);
        assert_eq!(
            kernel.create_ec(ec, pd, CpuId(0), 0x1000),
            Err(KernelError::InvalidCapability(pd))
        );
        kernel.create_pd(pd, "child").unwrap();
        kernel.create_ec(ec, pd, CpuId(0), 0x1000).unwrap();
        assert_eq!(kernel.object_kind(ec), Some(ObjectKind::Ec));
    }

    #[test]
    fn test_invalid_cpu() {
        let kernel = SimulatedKernel::with_cpus(2);
        assert_eq!(
            kernel.create_pt(CapSel::new(1), CpuId(2), 7),
            Err(KernelError::InvalidCpu(2))
        );
        let (sc, ec, pd) = (CapSel::new(1), CapSel::new(9), CapSel::new(8));
        assert!(kernel.create_sc(sc, ec, pd, CpuId(1), Qpd::default()).is_ok());
    }

    #[test]
    fn test_session_requires_portal() {
        let kernel = SimulatedKernel::new();
        let portal = CapSel::new(0x20);
        let session = CapSel::new(0x21);
        assert!(kernel.open_session(session, portal, "").is_err());
        kernel.create_pt(portal, CpuId(0), 0).unwrap();
        kernel.open_session(session, portal, "ro").unwrap();
        assert_eq!(kernel.object_label(session), Some("ro".to_string()));
    }

    #[test]
    fn test_semaphore_up_then_down_does_not_block() {
        let kernel = SimulatedKernel::new();
        let sm = CapSel::new(3);
        kernel.create_sm(sm, 0).unwrap();
        kernel.sm_up(sm).unwrap();
        assert_eq!(kernel.semaphore_count(sm), Some(1));
        kernel.sm_down(sm).unwrap();
        assert_eq!(kernel.semaphore_count(sm), Some(0));
    }

    #[test]
    fn test_semaphore_down_blocks_until_up() {
        let kernel = Arc::new(SimulatedKernel::new());
        let sm = CapSel::new(3);
        kernel.create_sm(sm, 0).unwrap();

        let waiter = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.sm_down(sm))
        };
        while kernel.semaphore_waiters(sm) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        kernel.sm_up(sm).unwrap();
        assert_eq!(waiter.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_revoke_wakes_waiters() {
        let kernel = Arc::new(SimulatedKernel::new());
        let sm = CapSel::new(3);
        kernel.create_sm(sm, 0).unwrap();

        let waiter = {
            let kernel = Arc::clone(&kernel);
            thread::spawn(move || kernel.sm_down(sm))
        };
        while kernel.semaphore_waiters(sm) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        kernel.revoke(sm).unwrap();
        assert_eq!(
            waiter.join().unwrap(),
            Err(KernelError::InvalidCapability(sm))
        );
    }

    #[test]
    fn test_audit_trail_order() {
        let kernel = SimulatedKernel::new();
        kernel.create_pd(CapSel::new(1), "child").unwrap();
        kernel.create_sm(CapSel::new(2), 0).unwrap();
        kernel.sm_up(CapSel::new(2)).unwrap();
        kernel.revoke(CapSel::new(2)).unwrap();
        kernel.revoke(CapSel::new(1)).unwrap();

        let log = kernel.audit_log();
        assert_eq!(log.len(), 5);
        assert_eq!(
            log.revocations(),
            vec![
                (CapSel::new(2), ObjectKind::Sm),
                (CapSel::new(1), ObjectKind::Pd)
            ]
        );
    }

    #[test]
    fn test_fault_plan_fails_creation() {
        let kernel = SimulatedKernel::new().with_fault_plan(FaultPlan::new().with_object_fault(
            ObjectFault::FailNextCreate {
                kind: Some(ObjectKind::Memory),
                count: 1,
            },
        ));
        assert!(matches!(
            kernel.create_memory(CapSel::new(1), 0x1000),
            Err(KernelError::ResourceExhausted(_))
        ));
        assert!(!kernel.is_live(CapSel::new(1)));
        assert!(kernel.create_memory(CapSel::new(1), 0x1000).is_ok());
    }

    #[test]
    fn test_live_objects_of_kind() {
        let kernel = SimulatedKernel::new();
        kernel.create_pt(CapSel::new(5), CpuId(0), 1).unwrap();
        kernel.create_pt(CapSel::new(4), CpuId(1), 1).unwrap();
        kernel.create_pd(CapSel::new(6), "x").unwrap();
        assert_eq!(
            kernel.live_objects_of(ObjectKind::Pt),
            vec![CapSel::new(4), CapSel::new(5)]
        );
    }
}
