//! Typed portal messages
//!
//! Each child reaches the manager through one portal per CPU. A call carries
//! a [`PortalRequest`]; the manager answers with a [`PortalReply`] whose
//! status is either a value or a structured error. Errors never cross the
//! portal any other way.

use crate::SchemaVersion;
use core_types::{CapSel, CpuId, MemoryPerms, Qpd, ThreadId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Portal message schema version (v1.0).
pub const PORTAL_SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0);

/// Operations a child may invoke on its manager portal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortalRequest {
    /// Announce a new thread whose execution context the child created
    AnnounceThread {
        ec: CapSel,
        name: String,
        thread_id: ThreadId,
        cpu: CpuId,
        qpd: Qpd,
    },
    /// Wait for a thread to terminate; `signal` is a semaphore the caller
    /// blocks on
    JoinThread { thread_id: ThreadId, signal: CapSel },
    /// Report that a thread finished and hand back its stack and UTCB
    TerminateThread {
        thread_id: ThreadId,
        stack: usize,
        utcb: usize,
    },
    OpenSession { service: String, args: String },
    CloseSession { handle: CapSel },
    AllocRegion { size: usize, perms: MemoryPerms },
    FreeRegion { addr: usize },
    AllocIoPorts { base: u32, count: u32 },
    FreeIoPorts { base: u32, count: u32 },
    /// Claim a specific interrupt line, or any free one
    AllocGsi { gsi: Option<u32> },
    ReleaseGsi { gsi: u32 },
}

impl PortalRequest {
    /// Operation name for logs
    pub fn op_name(&self) -> &'static str {
        match self {
            PortalRequest::AnnounceThread { .. } => "announce_thread",
            PortalRequest::JoinThread { .. } => "join_thread",
            PortalRequest::TerminateThread { .. } => "terminate_thread",
            PortalRequest::OpenSession { .. } => "open_session",
            PortalRequest::CloseSession { .. } => "close_session",
            PortalRequest::AllocRegion { .. } => "alloc_region",
            PortalRequest::FreeRegion { .. } => "free_region",
            PortalRequest::AllocIoPorts { .. } => "alloc_io_ports",
            PortalRequest::FreeIoPorts { .. } => "free_io_ports",
            PortalRequest::AllocGsi { .. } => "alloc_gsi",
            PortalRequest::ReleaseGsi { .. } => "release_gsi",
        }
    }
}

/// Successful result of a portal call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortalValue {
    None,
    /// A new thread's scheduling context plus where its stack and UTCB live
    Thread {
        sc: CapSel,
        stack: usize,
        utcb: usize,
    },
    Session { handle: CapSel },
    Region { addr: usize, size: usize },
    /// An interrupt line and the semaphore it is signalled through
    Gsi { gsi: u32, sm: CapSel },
}

/// Error kinds reported to children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortalErrorCode {
    NotFound,
    DuplicateId,
    PermissionDenied,
    ResourceExhausted,
    /// The call could not be decoded
    InvalidRequest,
}

impl fmt::Display for PortalErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PortalErrorCode::NotFound => "NotFound",
            PortalErrorCode::DuplicateId => "DuplicateId",
            PortalErrorCode::PermissionDenied => "PermissionDenied",
            PortalErrorCode::ResourceExhausted => "ResourceExhausted",
            PortalErrorCode::InvalidRequest => "InvalidRequest",
        };
        f.write_str(name)
    }
}

/// Structured portal error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalError {
    pub code: PortalErrorCode,
    pub message: String,
}

impl PortalError {
    pub fn new(code: PortalErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Portal reply status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortalStatus {
    Ok(PortalValue),
    Error(PortalError),
}

/// A versioned portal call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalCall {
    pub version: SchemaVersion,
    pub request: PortalRequest,
}

impl PortalCall {
    /// Creates a call using the current schema version.
    pub fn new(request: PortalRequest) -> Self {
        Self {
            version: PORTAL_SCHEMA_VERSION,
            request,
        }
    }
}

/// Structured portal reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalReply {
    pub version: SchemaVersion,
    pub status: PortalStatus,
}

impl PortalReply {
    /// Creates a successful reply.
    pub fn ok(value: PortalValue) -> Self {
        Self {
            version: PORTAL_SCHEMA_VERSION,
            status: PortalStatus::Ok(value),
        }
    }

    /// Creates an error reply.
    pub fn error(error: PortalError) -> Self {
        Self {
            version: PORTAL_SCHEMA_VERSION,
            status: PortalStatus::Error(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, PortalStatus::Ok(_))
    }

    /// Error code, if the call failed
    pub fn error_code(&self) -> Option<PortalErrorCode> {
        match &self.status {
            PortalStatus::Ok(_) => None,
            PortalStatus::Error(err) => Some(err.code),
        }
    }

    /// Converts the reply into a `Result`
    pub fn into_result(self) -> Result<PortalValue, PortalError> {
        match self.status {
            PortalStatus::Ok(value) => Ok(value),
            PortalStatus::Error(err) => Err(err),
        }
    }
}

/// Encoding or decoding failure
#[derive(Debug, Error)]
pub enum PortalCodecError {
    #[error("Malformed portal payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported portal schema {received}, expected {expected}")]
    IncompatibleVersion {
        expected: SchemaVersion,
        received: SchemaVersion,
    },
}

/// Serializes a call.
pub fn encode_call(call: &PortalCall) -> Result<Vec<u8>, PortalCodecError> {
    Ok(serde_json::to_vec(call)?)
}

/// Deserializes a call and checks its schema version.
pub fn decode_call(bytes: &[u8]) -> Result<PortalCall, PortalCodecError> {
    let call: PortalCall = serde_json::from_slice(bytes)?;
    if !call.version.is_compatible_with(&PORTAL_SCHEMA_VERSION) {
        return Err(PortalCodecError::IncompatibleVersion {
            expected: PORTAL_SCHEMA_VERSION,
            received: call.version,
        });
    }
    Ok(call)
}

/// Serializes a reply.
pub fn encode_reply(reply: &PortalReply) -> Result<Vec<u8>, PortalCodecError> {
    Ok(serde_json::to_vec(reply)?)
}

/// Deserializes a reply.
pub fn decode_reply(bytes: &[u8]) -> Result<PortalReply, PortalCodecError> {
    Ok(serde_json::from_slice(bytes)?)
}
