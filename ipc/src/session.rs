//! Client sessions

use core_types::{CapSel, ServiceId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A child's open connection to a service
///
/// The session is named by the capability at `handle`; the child uses that
/// selector value both to talk to the service and to close the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    pub handle: CapSel,
    pub service: String,
    pub service_id: ServiceId,
    pub args: String,
}

impl ClientSession {
    pub fn new(
        handle: CapSel,
        service: impl Into<String>,
        service_id: ServiceId,
        args: impl Into<String>,
    ) -> Self {
        Self {
            handle,
            service: service.into(),
            service_id,
            args: args.into(),
        }
    }
}

impl fmt::Display for ClientSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{} -> {}", self.handle, self.service)
        } else {
            write!(f, "{} -> {} ({})", self.handle, self.service, self.args)
        }
    }
}
