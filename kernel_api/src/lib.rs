//! # Kernel API
//!
//! This crate defines the interface between the child manager and the
//! capability-based microkernel underneath it.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Object creation at caller-chosen selectors (not implicit handles)
//! - Synchronous portals (not signals)
//! - Semaphores as the only blocking primitive
//! - Revocation as the only way to destroy an object
//!
//! ## Design Goals
//!
//! 1. **Testability**: The entire API can be simulated in-process
//! 2. **Explicitness**: Selector ownership stays with the caller
//! 3. **Shareability**: One kernel handle is used from every worker CPU
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - A definition of the wire format of capability invocations
//! - A scheduling policy (quantum and priority are passed through untouched)

pub mod error;
pub mod kernel;

pub use error::KernelError;
pub use kernel::{KernelApi, ObjectKind};
