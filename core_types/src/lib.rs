//! # Core Types
//!
//! This crate defines the fundamental types shared by the child manager and
//! its collaborators.
//!
//! ## Philosophy
//!
//! Core types are designed with these principles:
//! - **Explicit over implicit**: Selectors, thread IDs and child IDs are distinct types.
//! - **Type safety first**: The type system prevents mixing up identifiers.
//! - **No ambient authority**: A selector names an object only inside one capability space.
//!
//! ## Key Types
//!
//! - [`CapSel`]: A capability selector
//! - [`ChildId`]: Dense, reusable identifier of a child task
//! - [`ThreadId`]: Child-chosen identifier of one of its threads
//! - [`ServiceId`]: Unique identifier for services
//! - [`Qpd`]: Quantum/priority pair handed to the kernel

pub mod capability;
pub mod ids;
pub mod memory;

pub use capability::{CapSel, Qpd};
pub use ids::{ChildId, CpuId, ServiceId, ThreadId};
pub use memory::{checked_page_align_up, is_page_aligned, MemoryPerms, RegionKind, PAGE_SIZE};
