//! Resilience Test Utilities
//!
//! This crate provides shared utilities for resilience and integration tests.
//!
//! ## Test Philosophy
//!
//! - **Safety under faults**: Invariants hold even when a kernel call fails midway
//! - **Deterministic failures**: All faults are reproducible via FaultPlan
//! - **No capability leaks**: Every object made for a child is revoked when it goes
//! - **Concurrency**: Portal calls from many CPUs never corrupt a child's tables

use core_types::{CapSel, ChildId, CpuId, Qpd, ThreadId};
use kernel_api::KernelError;
use policy::PolicyEngine;
use services_child_manager::{ChildError, ChildManager, ChildManagerConfig, Platform, StartInfo};
use services_registry::ServiceRegistry;
use sim_kernel::test_utils::create_test_portal;
use sim_kernel::SimulatedKernel;
use std::sync::Arc;

/// Main thread id every test child starts with
pub const MAIN_THREAD: ThreadId = ThreadId(0x100);

/// A kernel, a service registry and a manager wired together
pub struct TestSystem {
    pub kernel: Arc<SimulatedKernel>,
    pub registry: Arc<ServiceRegistry>,
    pub manager: ChildManager,
}

/// Bootstrap helper for tests
///
/// Creates a kernel, a registry that permits everything and a manager with
/// the default configuration.
pub fn test_bootstrap() -> TestSystem {
    bootstrap_with(ChildManagerConfig::default(), ServiceRegistry::new())
}

/// Bootstrap with a session policy
pub fn bootstrap_with_policy(policy: Box<dyn PolicyEngine>) -> TestSystem {
    bootstrap_with(
        ChildManagerConfig::default(),
        ServiceRegistry::with_policy(policy),
    )
}

/// Bootstrap with a custom configuration and registry
pub fn bootstrap_with(config: ChildManagerConfig, registry: ServiceRegistry) -> TestSystem {
    init_logging();
    let kernel = Arc::new(SimulatedKernel::with_cpus(config.cpu_count));
    let registry = Arc::new(registry);
    let platform = Platform::new(kernel.clone(), registry.clone(), config)
        .expect("test configuration is valid");
    TestSystem {
        kernel,
        registry,
        manager: ChildManager::new(Arc::new(platform)),
    }
}

/// Start parameters for a test child
pub fn start_info() -> StartInfo {
    StartInfo {
        entry: 0x40_0000,
        main_thread: MAIN_THREAD,
        cpu: CpuId(0),
        qpd: Qpd::default(),
    }
}

impl TestSystem {
    /// Creates and starts a child
    pub fn spawn(&self, cmdline: &str) -> Result<ChildId, ChildError> {
        let id = self.manager.create_child(cmdline)?;
        self.manager.start_child(id, start_info())?;
        Ok(id)
    }

    /// Registers a built-in service behind a fresh portal
    pub fn register_service(&self, name: &str) -> Result<CapSel, KernelError> {
        let portal = create_test_portal(&self.kernel)?;
        self.registry
            .register(name, portal, None)
            .expect("service names are unique per test");
        Ok(portal)
    }
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
