//! Portal request routing
//!
//! Maps each [`PortalRequest`] onto the child operation that implements it.
//! Work that must happen after the child reference is gone (blocking on a
//! join, removing an exited child) is handed back to the manager as an
//! [`Invoked`] variant.

use crate::child::Child;
use crate::sched::ThreadExit;
use crate::ChildError;
use core_types::{CapSel, ThreadId};
use ipc::{PortalRequest, PortalValue};

/// Outcome of running a request against a child
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Invoked {
    /// Reply right away
    Value(PortalValue),
    /// Block on the semaphore, then reply
    Wait { thread_id: ThreadId, signal: CapSel },
    /// The main thread ended; the child must leave the registry
    MainExited,
}

pub(crate) fn invoke(child: &Child, request: PortalRequest) -> Result<Invoked, ChildError> {
    let value = match request {
        PortalRequest::AnnounceThread {
            ec,
            name,
            thread_id,
            cpu,
            qpd,
        } => {
            let grant = child.create_thread(ec, &name, thread_id, cpu, qpd)?;
            PortalValue::Thread {
                sc: grant.sc,
                stack: grant.stack,
                utcb: grant.utcb,
            }
        }
        PortalRequest::JoinThread { thread_id, signal } => {
            // Signaled or pending, the caller waits on the semaphore; a
            // signaled join just finds it already raised.
            child.join_thread(thread_id, signal)?;
            return Ok(Invoked::Wait { thread_id, signal });
        }
        PortalRequest::TerminateThread {
            thread_id,
            stack,
            utcb,
        } => match child.term_thread(thread_id, stack, utcb)? {
            ThreadExit::Main => return Ok(Invoked::MainExited),
            ThreadExit::Thread => PortalValue::None,
        },
        PortalRequest::OpenSession { service, args } => PortalValue::Session {
            handle: child.open_session(&service, &args, None)?,
        },
        PortalRequest::CloseSession { handle } => {
            child.close_session(handle)?;
            PortalValue::None
        }
        PortalRequest::AllocRegion { size, perms } => {
            let region = child.alloc_region(size, perms)?;
            PortalValue::Region {
                addr: region.addr,
                size: region.size,
            }
        }
        PortalRequest::FreeRegion { addr } => {
            child.free_region(addr)?;
            PortalValue::None
        }
        PortalRequest::AllocIoPorts { base, count } => {
            child.alloc_io_ports(base, count)?;
            PortalValue::None
        }
        PortalRequest::FreeIoPorts { base, count } => {
            child.free_io_ports(base, count)?;
            PortalValue::None
        }
        PortalRequest::AllocGsi { gsi } => {
            let (gsi, sm) = child.alloc_gsi(gsi)?;
            PortalValue::Gsi { gsi, sm }
        }
        PortalRequest::ReleaseGsi { gsi } => {
            child.release_gsi(gsi)?;
            PortalValue::None
        }
    };
    Ok(Invoked::Value(value))
}
