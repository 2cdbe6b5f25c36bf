//! Child manager errors

use core_types::{CapSel, ChildId, CpuId, ThreadId};
use ipc::{PortalError, PortalErrorCode};
use kernel_api::KernelError;
use resources::ResourceError;
use thiserror::Error;

use crate::ChildState;

/// Errors returned by child and manager operations
///
/// Every variant maps onto one of the error kinds a child sees through
/// [`ChildError::code`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChildError {
    #[error("{0} not found")]
    ChildNotFound(ChildId),

    #[error("{child}: no session at {handle}")]
    SessionNotFound { child: ChildId, handle: CapSel },

    #[error("{child}: service '{service}' not found")]
    ServiceNotFound { child: ChildId, service: String },

    #[error("{child}: no region at {addr:#x}")]
    RegionNotFound { child: ChildId, addr: usize },

    #[error("{child}: IO ports {base:#x}+{count} not held")]
    PortsNotHeld {
        child: ChildId,
        base: u32,
        count: u32,
    },

    #[error("{child}: GSI {gsi} not held")]
    GsiNotHeld { child: ChildId, gsi: u32 },

    #[error("{child}: {thread} already announced")]
    DuplicateThread { child: ChildId, thread: ThreadId },

    #[error("{child}: {thread} already has a pending join")]
    JoinPending { child: ChildId, thread: ThreadId },

    #[error("{child}: session with '{service}' not permitted")]
    PermissionDenied { child: ChildId, service: String },

    #[error("{child} has not been started")]
    NotStarted { child: ChildId },

    #[error("{child} has already been started")]
    AlreadyStarted { child: ChildId },

    #[error("{child} is {state}")]
    NotRunning { child: ChildId, state: ChildState },

    #[error("{child}: no such CPU {cpu}")]
    InvalidCpu { child: ChildId, cpu: CpuId },

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl ChildError {
    /// Error kind reported to the child
    pub fn code(&self) -> PortalErrorCode {
        match self {
            ChildError::ChildNotFound(_)
            | ChildError::SessionNotFound { .. }
            | ChildError::ServiceNotFound { .. }
            | ChildError::RegionNotFound { .. }
            | ChildError::PortsNotHeld { .. }
            | ChildError::GsiNotHeld { .. }
            | ChildError::NotStarted { .. }
            | ChildError::AlreadyStarted { .. }
            | ChildError::NotRunning { .. }
            | ChildError::InvalidCpu { .. } => PortalErrorCode::NotFound,
            ChildError::DuplicateThread { .. } | ChildError::JoinPending { .. } => {
                PortalErrorCode::DuplicateId
            }
            ChildError::PermissionDenied { .. } => PortalErrorCode::PermissionDenied,
            ChildError::Resource(_) => PortalErrorCode::ResourceExhausted,
            ChildError::Kernel(err) => match err {
                KernelError::InvalidCapability(_) | KernelError::InvalidCpu(_) => {
                    PortalErrorCode::NotFound
                }
                KernelError::SelectorInUse(_) | KernelError::ResourceExhausted(_) => {
                    PortalErrorCode::ResourceExhausted
                }
            },
        }
    }

    /// Converts the error into what crosses the portal
    pub fn to_portal_error(&self) -> PortalError {
        PortalError::new(self.code(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resources::ResourceKind;

    #[test]
    fn test_codes() {
        let child = ChildId(1);
        assert_eq!(
            ChildError::ChildNotFound(child).code(),
            PortalErrorCode::NotFound
        );
        assert_eq!(
            ChildError::DuplicateThread {
                child,
                thread: ThreadId(0x1000)
            }
            .code(),
            PortalErrorCode::DuplicateId
        );
        assert_eq!(
            ChildError::PermissionDenied {
                child,
                service: "log".to_string()
            }
            .code(),
            PortalErrorCode::PermissionDenied
        );
        assert_eq!(
            ChildError::from(ResourceError::QuotaExceeded {
                resource: ResourceKind::Threads,
                limit: 4
            })
            .code(),
            PortalErrorCode::ResourceExhausted
        );
        assert_eq!(
            ChildError::from(KernelError::ResourceExhausted("sc".to_string())).code(),
            PortalErrorCode::ResourceExhausted
        );
        assert_eq!(
            ChildError::from(KernelError::InvalidCapability(CapSel::new(3))).code(),
            PortalErrorCode::NotFound
        );
    }

    #[test]
    fn test_lifecycle_refusals_are_not_found() {
        let child = ChildId(2);
        let errors = [
            ChildError::NotStarted { child },
            ChildError::NotRunning {
                child,
                state: ChildState::Terminating,
            },
            ChildError::InvalidCpu {
                child,
                cpu: CpuId(9),
            },
        ];
        for err in errors {
            assert_eq!(err.code(), PortalErrorCode::NotFound);
        }
    }

    #[test]
    fn test_portal_error_carries_message() {
        let err = ChildError::SessionNotFound {
            child: ChildId(1),
            handle: CapSel::new(0x42),
        };
        let portal = err.to_portal_error();
        assert_eq!(portal.code, PortalErrorCode::NotFound);
        assert_eq!(portal.message, "Child(1): no session at sel:0x42");
    }
}
