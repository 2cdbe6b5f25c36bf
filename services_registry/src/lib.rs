//! # Service Registry
//!
//! This crate implements name-based service discovery for children.
//!
//! ## Philosophy
//!
//! A service is reachable only through its portal capability. The registry
//! maps names to portals and asks a [`PolicyEngine`] whether a given child
//! may open a session; it never opens sessions itself.

use core_types::{CapSel, ChildId, ServiceId};
use parking_lot::RwLock;
use policy::{NoOpPolicy, PolicyContext, PolicyEngine, PolicyEvent};
use std::collections::HashMap;
use thiserror::Error;

/// Error types for registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Service name already registered
    #[error("Service name already registered: {0}")]
    NameAlreadyRegistered(String),

    /// Service not found
    #[error("Service not found: {0}")]
    NotFound(ServiceId),

    /// Service name not found
    #[error("Service name not found: {0}")]
    NameNotFound(String),

    /// The portal selector does not name anything
    #[error("Invalid service portal for '{0}'")]
    InvalidPortal(String),
}

/// A registered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub id: ServiceId,
    pub name: String,
    /// Portal sessions are opened through
    pub portal: CapSel,
    /// Child that provides the service, if it is not built in
    pub provider: Option<ChildId>,
}

/// What the child manager needs from a service registry
pub trait ServiceDirectory: Send + Sync {
    /// Looks a service up by name
    fn resolve(&self, name: &str) -> Option<Service>;

    /// Returns true if the child may open a session with `service`
    fn permitted(&self, child: ChildId, cmdline: &str, service: &Service) -> bool;
}

#[derive(Default)]
struct Tables {
    services: HashMap<ServiceId, Service>,
    names: HashMap<String, ServiceId>,
}

/// Service registry
///
/// Shared by every worker CPU; lookups take a read lock only.
pub struct ServiceRegistry {
    tables: RwLock<Tables>,
    policy: Box<dyn PolicyEngine>,
}

impl ServiceRegistry {
    /// Creates a registry that permits every session
    pub fn new() -> Self {
        Self::with_policy(Box::new(NoOpPolicy))
    }

    /// Creates a registry whose session permissions come from `policy`
    pub fn with_policy(policy: Box<dyn PolicyEngine>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            policy,
        }
    }

    /// Registers a service under `name`
    pub fn register(
        &self,
        name: impl Into<String>,
        portal: CapSel,
        provider: Option<ChildId>,
    ) -> Result<ServiceId, RegistryError> {
        let name = name.into();
        if !portal.is_valid() {
            return Err(RegistryError::InvalidPortal(name));
        }
        let mut tables = self.tables.write();
        if tables.names.contains_key(&name) {
            return Err(RegistryError::NameAlreadyRegistered(name));
        }
        let id = ServiceId::new();
        tables.names.insert(name.clone(), id);
        tables.services.insert(
            id,
            Service {
                id,
                name,
                portal,
                provider,
            },
        );
        Ok(id)
    }

    /// Looks up a service
    pub fn lookup(&self, service_id: ServiceId) -> Result<Service, RegistryError> {
        self.tables
            .read()
            .services
            .get(&service_id)
            .cloned()
            .ok_or(RegistryError::NotFound(service_id))
    }

    /// Looks up a service by name.
    pub fn lookup_by_name(&self, name: &str) -> Result<Service, RegistryError> {
        let tables = self.tables.read();
        tables
            .names
            .get(name)
            .and_then(|id| tables.services.get(id))
            .cloned()
            .ok_or_else(|| RegistryError::NameNotFound(name.to_string()))
    }

    /// Unregisters a service
    pub fn unregister(&self, service_id: ServiceId) -> Result<Service, RegistryError> {
        let mut tables = self.tables.write();
        let service = tables
            .services
            .remove(&service_id)
            .ok_or(RegistryError::NotFound(service_id))?;
        tables.names.remove(&service.name);
        Ok(service)
    }

    /// Returns the number of registered services
    pub fn count(&self) -> usize {
        self.tables.read().services.len()
    }

    /// Name of the policy engine in use
    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceDirectory for ServiceRegistry {
    fn resolve(&self, name: &str) -> Option<Service> {
        self.lookup_by_name(name).ok()
    }

    fn permitted(&self, child: ChildId, cmdline: &str, service: &Service) -> bool {
        let context = PolicyContext::for_session(child, cmdline, service.name.clone());
        self.policy
            .evaluate(PolicyEvent::OnSessionOpen, &context)
            .is_allow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy::ServiceAllowList;

    #[test]
    fn test_registry_creation() {
        let registry = ServiceRegistry::new();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.policy_name(), "NoOpPolicy");
    }

    #[test]
    fn test_service_registration() {
        let registry = ServiceRegistry::new();
        let id = registry.register("log", CapSel::new(0x20), None).unwrap();
        assert_eq!(registry.count(), 1);

        let service = registry.lookup(id).unwrap();
        assert_eq!(service.name, "log");
        assert_eq!(service.portal, CapSel::new(0x20));
        assert_eq!(registry.lookup_by_name("log").unwrap().id, id);
    }

    #[test]
    fn test_duplicate_name() {
        let registry = ServiceRegistry::new();
        registry.register("log", CapSel::new(1), None).unwrap();
        let result = registry.register("log", CapSel::new(2), Some(ChildId(3)));
        assert_eq!(
            result,
            Err(RegistryError::NameAlreadyRegistered("log".to_string()))
        );
    }

    #[test]
    fn test_invalid_portal_rejected() {
        let registry = ServiceRegistry::new();
        assert_eq!(
            registry.register("log", CapSel::INVALID, None),
            Err(RegistryError::InvalidPortal("log".to_string()))
        );
    }

    #[test]
    fn test_service_unregistration() {
        let registry = ServiceRegistry::new();
        let id = registry.register("timer", CapSel::new(5), None).unwrap();
        registry.unregister(id).unwrap();
        assert_eq!(registry.count(), 0);
        assert!(registry.resolve("timer").is_none());
        assert_eq!(registry.unregister(id), Err(RegistryError::NotFound(id)));
    }

    #[test]
    fn test_lookup_by_name_not_found() {
        let registry = ServiceRegistry::new();
        assert_eq!(
            registry.lookup_by_name("nope"),
            Err(RegistryError::NameNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_permitted_uses_policy() {
        let registry =
            ServiceRegistry::with_policy(Box::new(ServiceAllowList::new().allow("disk", "fs")));
        registry.register("disk", CapSel::new(9), None).unwrap();
        let disk = registry.resolve("disk").unwrap();

        assert!(registry.permitted(ChildId(1), "fs /dev/sda", &disk));
        assert!(!registry.permitted(ChildId(2), "shell", &disk));
    }
}
