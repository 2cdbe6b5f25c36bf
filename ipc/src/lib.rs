//! # Portal IPC schema
//!
//! This crate defines the messages exchanged over a child's service portal.
//!
//! ## Philosophy
//!
//! - **Typed, not stringly-typed**: Every portal operation is a variant of [`PortalRequest`]
//! - **Errors are values**: A reply carries either a [`PortalValue`] or a [`PortalError`]
//! - **Versionable**: Payloads carry a [`SchemaVersion`]
//!
//! The capability-invocation mechanism underneath is not modelled here;
//! only the payload schema and its JSON encoding are.

pub mod portal;
pub mod session;
pub mod version;

pub use portal::{
    decode_call, decode_reply, encode_call, encode_reply, PortalCall, PortalCodecError,
    PortalError, PortalErrorCode, PortalReply, PortalRequest, PortalStatus, PortalValue,
    PORTAL_SCHEMA_VERSION,
};
pub use session::ClientSession;
pub use version::SchemaVersion;
