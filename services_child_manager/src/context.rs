//! Process-wide context shared by all children
//!
//! The kernel, the service directory and the global allocators are passed
//! to every child explicitly through a [`Platform`]; nothing is reached
//! through a global.

use crate::config::{ChildManagerConfig, ConfigError};
use core_types::{CapSel, ChildId};
use kernel_api::KernelApi;
use parking_lot::Mutex;
use resources::{CapSelSpace, GsiSpace, PortSpace};
use services_registry::ServiceDirectory;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Everything a child operation may need beyond the child itself
pub struct Platform {
    kernel: Arc<dyn KernelApi>,
    services: Arc<dyn ServiceDirectory>,
    config: ChildManagerConfig,
    caps: CapSelSpace,
    gsis: GsiSpace,
    ports: PortSpace,
}

impl Platform {
    /// Builds the global allocators described by `config`
    pub fn new(
        kernel: Arc<dyn KernelApi>,
        services: Arc<dyn ServiceDirectory>,
        config: ChildManagerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            kernel,
            services,
            caps: CapSelSpace::new(config.cap_space_base, config.cap_space_size),
            gsis: GsiSpace::new(config.max_gsis),
            ports: PortSpace::new(config.io_port_count),
            config,
        })
    }

    pub fn kernel(&self) -> &Arc<dyn KernelApi> {
        &self.kernel
    }

    pub fn services(&self) -> &dyn ServiceDirectory {
        self.services.as_ref()
    }

    pub fn config(&self) -> &ChildManagerConfig {
        &self.config
    }

    pub fn caps(&self) -> &CapSelSpace {
        &self.caps
    }

    pub fn gsis(&self) -> &GsiSpace {
        &self.gsis
    }

    pub fn ports(&self) -> &PortSpace {
        &self.ports
    }

    /// Revokes the object at `sel` and returns the selector to the space.
    ///
    /// # Panics
    ///
    /// Panics if the kernel has no object there: the caller believed it
    /// owned a capability that does not exist.
    pub(crate) fn release_sel(&self, sel: CapSel) {
        self.revoke(sel);
        self.caps.free(sel, 1);
    }

    /// Revokes the object at `sel`, leaving the selector reserved.
    ///
    /// # Panics
    ///
    /// Panics if the kernel has no object there.
    pub(crate) fn revoke(&self, sel: CapSel) {
        if let Err(err) = self.kernel.revoke(sel) {
            panic!("revoking owned capability {} failed: {}", sel, err);
        }
    }
}

/// Allocator of dense child ids
///
/// Ids start at 1. The smallest released id is handed out first.
#[derive(Debug)]
pub struct IdPool {
    inner: Mutex<IdPoolInner>,
}

#[derive(Debug)]
struct IdPoolInner {
    next: usize,
    free: BTreeSet<usize>,
}

impl IdPool {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(IdPoolInner {
                next: 1,
                free: BTreeSet::new(),
            }),
        }
    }

    pub fn acquire(&self) -> ChildId {
        let mut inner = self.inner.lock();
        if let Some(id) = inner.free.pop_first() {
            return ChildId(id);
        }
        let id = inner.next;
        inner.next += 1;
        ChildId(id)
    }

    /// Makes `id` available again.
    ///
    /// # Panics
    ///
    /// Panics if `id` was never handed out or is already free.
    pub fn release(&self, id: ChildId) {
        let mut inner = self.inner.lock();
        assert!(
            id.0 >= 1 && id.0 < inner.next,
            "{} released but never allocated",
            id
        );
        let fresh = inner.free.insert(id.0);
        assert!(fresh, "{} released twice", id);
    }

    /// Number of ids currently handed out
    pub fn in_use(&self) -> usize {
        let inner = self.inner.lock();
        inner.next - 1 - inner.free.len()
    }
}

impl Default for IdPool {
    fn default() -> Self {
        Self::new()
    }
}
