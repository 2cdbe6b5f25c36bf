//! # Policy Engine Framework
//!
//! This crate provides pluggable policy engines that decide whether a child
//! may open a session with a service.
//!
//! ## Philosophy
//!
//! - **Mechanism not policy**: The child manager enforces, engines decide
//! - **Explicit and testable**: Decisions are pure functions of their inputs
//! - **Pluggable and removable**: The system works with [`NoOpPolicy`]
//!
//! ## Core Concepts
//!
//! - [`PolicyEngine`]: Trait for evaluating policy decisions
//! - [`PolicyDecision`]: Allow or Deny
//! - [`PolicyContext`]: Who asks for what
//! - [`PolicyEvent`]: Events that trigger evaluation
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - POSIX users/groups/ACLs
//! - Authentication or cryptography
//!
//! Authority still comes from capabilities; a policy can only take it away.

use core_types::ChildId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Policy decision result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyDecision {
    /// Operation is allowed to proceed
    Allow,
    /// Operation is denied with a specific reason
    Deny { reason: String },
}

impl PolicyDecision {
    /// Creates an Allow decision
    pub fn allow() -> Self {
        Self::Allow
    }

    /// Creates a Deny decision with a reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Returns true if this is an Allow decision
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns true if this is a Deny decision
    pub fn is_deny(&self) -> bool {
        matches!(self, Self::Deny { .. })
    }
}

impl fmt::Display for PolicyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => write!(f, "Allow"),
            Self::Deny { reason } => write!(f, "Deny: {}", reason),
        }
    }
}

/// Context information for policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyContext {
    /// Child performing the operation
    pub child: ChildId,
    /// Command line the child was started with
    pub cmdline: String,
    /// Service the operation targets
    pub service: String,
}

impl PolicyContext {
    /// Creates a context for a session open
    pub fn for_session(child: ChildId, cmdline: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            child,
            cmdline: cmdline.into(),
            service: service.into(),
        }
    }

    /// Program name: the first word of the command line
    pub fn program(&self) -> &str {
        self.cmdline.split_whitespace().next().unwrap_or("")
    }
}

/// Events that trigger policy evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyEvent {
    /// A child asks to open a session with a service
    OnSessionOpen,
}

impl fmt::Display for PolicyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnSessionOpen => write!(f, "OnSessionOpen"),
        }
    }
}

/// Policy engine trait
///
/// Engines are consulted from every worker CPU of the child manager, so
/// they must be `Send + Sync`.
pub trait PolicyEngine: Send + Sync {
    /// Evaluates a policy for the given event and context
    ///
    /// Must be deterministic: same inputs always produce same outputs.
    /// Must be side-effect free: does not modify system state.
    fn evaluate(&self, event: PolicyEvent, context: &PolicyContext) -> PolicyDecision;

    /// Returns the name of this policy engine (for logging/audit)
    fn name(&self) -> &str;
}

/// Reference implementation: No-op policy
///
/// Always allows all operations.
#[derive(Debug, Clone)]
pub struct NoOpPolicy;

impl PolicyEngine for NoOpPolicy {
    fn evaluate(&self, _event: PolicyEvent, _context: &PolicyContext) -> PolicyDecision {
        PolicyDecision::Allow
    }

    fn name(&self) -> &str {
        "NoOpPolicy"
    }
}

/// Per-service allow list
///
/// A service with an entry may only be opened by the programs listed for
/// it. Services without an entry are open to everyone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceAllowList {
    rules: BTreeMap<String, BTreeSet<String>>,
}

impl ServiceAllowList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: allows `program` to open `service`
    pub fn allow(mut self, service: impl Into<String>, program: impl Into<String>) -> Self {
        self.rules
            .entry(service.into())
            .or_default()
            .insert(program.into());
        self
    }

    /// Builder: restricts `service` without allowing anyone yet
    pub fn restrict(mut self, service: impl Into<String>) -> Self {
        self.rules.entry(service.into()).or_default();
        self
    }

    pub fn is_restricted(&self, service: &str) -> bool {
        self.rules.contains_key(service)
    }
}

impl PolicyEngine for ServiceAllowList {
    fn evaluate(&self, event: PolicyEvent, context: &PolicyContext) -> PolicyDecision {
        match event {
            PolicyEvent::OnSessionOpen => match self.rules.get(&context.service) {
                None => PolicyDecision::allow(),
                Some(programs) if programs.contains(context.program()) => PolicyDecision::allow(),
                Some(_) => PolicyDecision::deny(format!(
                    "{} may not open service '{}'",
                    context.program(),
                    context.service
                )),
            },
        }
    }

    fn name(&self) -> &str {
        "ServiceAllowList"
    }
}

/// Composed policy
///
/// Evaluates multiple policies in order; the first deny wins.
pub struct ComposedPolicy {
    policies: Vec<Box<dyn PolicyEngine>>,
}

impl ComposedPolicy {
    /// Creates a new composed policy with no policies
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
        }
    }

    /// Adds a policy to the composition
    pub fn add_policy(mut self, policy: Box<dyn PolicyEngine>) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for ComposedPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine for ComposedPolicy {
    fn evaluate(&self, event: PolicyEvent, context: &PolicyContext) -> PolicyDecision {
        for policy in &self.policies {
            if let PolicyDecision::Deny { reason } = policy.evaluate(event, context) {
                return PolicyDecision::Deny {
                    reason: format!("{}: {}", policy.name(), reason),
                };
            }
        }
        PolicyDecision::Allow
    }

    fn name(&self) -> &str {
        "ComposedPolicy"
    }
}
