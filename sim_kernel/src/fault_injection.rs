//! Deterministic fault injection for testing
//!
//! This module lets tests make kernel object creation fail at a chosen
//! point, to exercise the manager's rollback and teardown paths.
//!
//! ## Design Philosophy
//!
//! - **Deterministic**: No randomness; faults trigger by count
//! - **Composable**: A plan may hold several faults
//! - **Test-focused**: Not intended for production use
//!
//! ## Example
//!
//! ```
//! use sim_kernel::fault_injection::{FaultPlan, ObjectFault};
//! use kernel_api::ObjectKind;
//!
//! let plan = FaultPlan::new()
//!     .with_object_fault(ObjectFault::FailNextCreate { kind: Some(ObjectKind::Sc), count: 1 });
//! assert_eq!(plan.object_faults().len(), 1);
//! ```

use kernel_api::ObjectKind;

/// A fault to inject into object creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectFault {
    /// Fail the next `count` creations (of `kind`, or of any kind)
    FailNextCreate {
        kind: Option<ObjectKind>,
        count: usize,
    },

    /// Let `skip` matching creations succeed, then fail the next one
    FailCreateAfter {
        kind: Option<ObjectKind>,
        skip: usize,
    },
}

/// A plan describing all faults to inject
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    object_faults: Vec<ObjectFault>,
}

impl FaultPlan {
    /// Creates a new empty fault plan
    pub fn new() -> Self {
        Self {
            object_faults: Vec::new(),
        }
    }

    /// Adds an object fault to the plan
    pub fn with_object_fault(mut self, fault: ObjectFault) -> Self {
        self.object_faults.push(fault);
        self
    }

    /// Returns a reference to the object faults
    pub fn object_faults(&self) -> &[ObjectFault] {
        &self.object_faults
    }
}

#[derive(Debug)]
struct ArmedFault {
    kind: Option<ObjectKind>,
    skip: usize,
    fail: usize,
}

impl ArmedFault {
    fn matches(&self, kind: ObjectKind) -> bool {
        self.kind.map_or(true, |k| k == kind)
    }
}

/// Applies a [`FaultPlan`] to a stream of object creations
#[derive(Debug)]
pub struct FaultInjector {
    armed: Vec<ArmedFault>,
    injected: usize,
}

impl FaultInjector {
    /// Creates a new fault injector with the given plan
    pub fn new(plan: FaultPlan) -> Self {
        let armed = plan
            .object_faults
            .into_iter()
            .map(|fault| match fault {
                ObjectFault::FailNextCreate { kind, count } => ArmedFault {
                    kind,
                    skip: 0,
                    fail: count,
                },
                ObjectFault::FailCreateAfter { kind, skip } => ArmedFault {
                    kind,
                    skip,
                    fail: 1,
                },
            })
            .collect();
        Self { armed, injected: 0 }
    }

    /// Decides whether the creation of an object of `kind` should fail.
    pub fn should_fail_create(&mut self, kind: ObjectKind) -> bool {
        let mut fail = false;
        for fault in self.armed.iter_mut().filter(|f| f.matches(kind)) {
            if fault.skip > 0 {
                fault.skip -= 1;
            } else if fault.fail > 0 && !fail {
                fault.fail -= 1;
                fail = true;
            }
        }
        self.armed.retain(|f| f.fail > 0);
        if fail {
            self.injected += 1;
        }
        fail
    }

    /// Number of faults injected so far
    pub fn injected(&self) -> usize {
        self.injected
    }

    /// Returns true once every fault in the plan has fired
    pub fn is_exhausted(&self) -> bool {
        self.armed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_next_create_any_kind() {
        let mut injector = FaultInjector::new(FaultPlan::new().with_object_fault(
            ObjectFault::FailNextCreate {
                kind: None,
                count: 2,
            },
        ));
        assert!(injector.should_fail_create(ObjectKind::Pd));
        assert!(injector.should_fail_create(ObjectKind::Sm));
        assert!(!injector.should_fail_create(ObjectKind::Sm));
        assert_eq!(injector.injected(), 2);
        assert!(injector.is_exhausted());
    }

    #[test]
    fn test_fail_next_create_by_kind() {
        let mut injector = FaultInjector::new(FaultPlan::new().with_object_fault(
            ObjectFault::FailNextCreate {
                kind: Some(ObjectKind::Sc),
                count: 1,
            },
        ));
        assert!(!injector.should_fail_create(ObjectKind::Ec));
        assert!(injector.should_fail_create(ObjectKind::Sc));
        assert!(!injector.should_fail_create(ObjectKind::Sc));
    }

    #[test]
    fn test_fail_create_after() {
        let mut injector = FaultInjector::new(FaultPlan::new().with_object_fault(
            ObjectFault::FailCreateAfter {
                kind: Some(ObjectKind::Pt),
                skip: 2,
            },
        ));
        assert!(!injector.should_fail_create(ObjectKind::Pt));
        assert!(!injector.should_fail_create(ObjectKind::Memory));
        assert!(!injector.should_fail_create(ObjectKind::Pt));
        assert!(injector.should_fail_create(ObjectKind::Pt));
        assert!(!injector.should_fail_create(ObjectKind::Pt));
    }

    #[test]
    fn test_empty_plan_never_fails() {
        let mut injector = FaultInjector::new(FaultPlan::new());
        assert!(injector.is_exhausted());
        assert!(!injector.should_fail_create(ObjectKind::Pd));
    }
}
