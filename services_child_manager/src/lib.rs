//! # Child Manager Service
//!
//! This crate creates child tasks, tracks every kernel object it makes on
//! their behalf and releases all of it when a child goes away.
//!
//! ## Philosophy
//!
//! A child owns nothing it did not get through its manager portal:
//! - Threads become runnable only once announced (not implicitly on creation)
//! - Sessions are opened through the service registry (not by portal guessing)
//! - Teardown is one ordered walk over the child's tables (not ad hoc cleanup)
//!
//! ## Concurrency
//!
//! Portal calls arrive on every CPU at once. Each child has its own lock;
//! the registry lock only guards lookups, inserts and removals. Children
//! are reference counted so a removed child outlives the calls still
//! running on it.

pub mod child;
pub mod child_info;
pub mod config;
pub mod context;
pub mod error;
pub mod lifecycle;
pub mod manager;
mod portal;
pub mod sched;
pub mod session;

pub use child::{Child, StartInfo};
pub use child_info::ChildInfo;
pub use config::{ChildManagerConfig, ConfigError};
pub use context::{IdPool, Platform};
pub use error::ChildError;
pub use lifecycle::{ChildState, TeardownPhase};
pub use manager::ChildManager;
pub use sched::{
    JoinItem, JoinOutcome, MainThread, SchedEntity, ThreadExit, ThreadGrant, MAIN_THREAD_NAME,
};
pub use session::SessionTable;
