//! # Child Manager
//!
//! The registry of children and the entry point for portal calls.
//!
//! Calls arrive concurrently on every CPU's portal. The registry lock is
//! held only to look a child up, insert it or remove it; the operation
//! itself runs under the child's own lock on a cloned `Arc`. A child that
//! is removed while calls are in flight stays alive until the last of them
//! returns, and only then is it torn down.

use crate::child::{Child, StartInfo};
use crate::child_info::{self, ChildInfo};
use crate::context::{IdPool, Platform};
use crate::portal::{self, Invoked};
use crate::ChildError;
use core_types::{CapSel, ChildId, ThreadId};
use ipc::{
    PortalCodecError, PortalError, PortalErrorCode, PortalReply, PortalRequest, PortalValue,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Registry of all children
pub struct ChildManager {
    platform: Arc<Platform>,
    ids: Arc<IdPool>,
    children: RwLock<BTreeMap<ChildId, Arc<Child>>>,
}

impl ChildManager {
    pub fn new(platform: Arc<Platform>) -> Self {
        Self {
            platform,
            ids: Arc::new(IdPool::new()),
            children: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn platform(&self) -> &Arc<Platform> {
        &self.platform
    }

    /// Registers a new child in the `Created` state
    pub fn create_child(&self, cmdline: impl Into<String>) -> Result<ChildId, ChildError> {
        let id = self.ids.acquire();
        let child = match Child::new(
            id,
            cmdline.into(),
            Arc::clone(&self.platform),
            Arc::clone(&self.ids),
        ) {
            Ok(child) => child,
            Err(err) => {
                self.ids.release(id);
                log::warn!("{} could not be created: {}", id, err);
                return Err(err);
            }
        };
        log::info!("{} created: {}", id, child.cmdline());
        let previous = self.children.write().insert(id, Arc::new(child));
        assert!(previous.is_none(), "{} registered twice", id);
        Ok(id)
    }

    /// Starts a created child.
    ///
    /// A child that fails to start is removed and torn down.
    pub fn start_child(&self, id: ChildId, info: StartInfo) -> Result<(), ChildError> {
        let child = self.child(id).ok_or(ChildError::ChildNotFound(id))?;
        match child.start(info) {
            Ok(()) => Ok(()),
            Err(err @ ChildError::AlreadyStarted { .. }) => Err(err),
            Err(err) => {
                log::warn!("{} failed to start: {}", id, err);
                self.detach(id, &child);
                Err(err)
            }
        }
    }

    /// Looks a child up; the returned reference keeps it alive
    pub fn child(&self, id: ChildId) -> Option<Arc<Child>> {
        self.children.read().get(&id).cloned()
    }

    /// Runs one portal operation for a child.
    ///
    /// A join blocks the calling worker until the thread ends, without
    /// holding any reference to the child. When the main thread terminates
    /// the child is removed.
    pub fn dispatch(&self, id: ChildId, request: PortalRequest) -> Result<PortalValue, ChildError> {
        let child = self.child(id).ok_or(ChildError::ChildNotFound(id))?;
        log::debug!("{}: {}", id, request.op_name());
        match portal::invoke(&child, request)? {
            Invoked::Value(value) => Ok(value),
            Invoked::Wait { thread_id, signal } => {
                let weak = Arc::downgrade(&child);
                drop(child);
                if let Err(err) = self.platform.kernel().sm_down(signal) {
                    // Nobody will wait on this join; free the slot.
                    if let Some(child) = weak.upgrade() {
                        child.cancel_join(thread_id, signal);
                    }
                    return Err(err.into());
                }
                Ok(PortalValue::None)
            }
            Invoked::MainExited => {
                self.detach(id, &child);
                Ok(PortalValue::None)
            }
        }
    }

    /// Blocks until `thread_id` of child `id` has terminated
    pub fn join_thread(
        &self,
        id: ChildId,
        thread_id: ThreadId,
        signal: CapSel,
    ) -> Result<(), ChildError> {
        self.dispatch(id, PortalRequest::JoinThread { thread_id, signal })
            .map(|_| ())
    }

    /// Removes a child from the registry.
    ///
    /// Teardown runs when the last in-flight call on the child returns,
    /// which may be right here.
    pub fn remove_child(&self, id: ChildId) -> Result<(), ChildError> {
        let removed = self.children.write().remove(&id);
        match removed {
            Some(child) => {
                log::info!("{} removed", id);
                drop(child);
                Ok(())
            }
            None => Err(ChildError::ChildNotFound(id)),
        }
    }

    /// Removes `id` only if it is still `child`; the id may have been
    /// removed and handed out again meanwhile.
    fn detach(&self, id: ChildId, child: &Arc<Child>) {
        let removed = {
            let mut children = self.children.write();
            match children.get(&id) {
                Some(current) if Arc::ptr_eq(current, child) => children.remove(&id),
                _ => None,
            }
        };
        if removed.is_some() {
            log::info!("{} removed", id);
        }
    }

    pub fn len(&self) -> usize {
        self.children.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.read().is_empty()
    }

    /// Ids of all registered children, ascending
    pub fn ids(&self) -> Vec<ChildId> {
        self.children.read().keys().copied().collect()
    }

    /// Snapshots of all registered children, ascending by id
    pub fn infos(&self) -> Vec<ChildInfo> {
        let children: Vec<Arc<Child>> = self.children.read().values().cloned().collect();
        children.iter().map(|child| child.info()).collect()
    }

    /// Child listing as a table
    pub fn format_table(&self) -> String {
        child_info::format_table(&self.infos())
    }

    /// Runs a typed portal call and wraps the outcome in a reply
    pub fn handle_portal(&self, id: ChildId, request: PortalRequest) -> PortalReply {
        let op = request.op_name();
        match self.dispatch(id, request) {
            Ok(value) => PortalReply::ok(value),
            Err(err) => {
                log::debug!("{}: {} failed: {}", id, op, err);
                PortalReply::error(err.to_portal_error())
            }
        }
    }

    /// Runs an encoded portal call and returns the encoded reply.
    ///
    /// Undecodable calls are answered with an `InvalidRequest` error.
    pub fn handle_portal_bytes(&self, id: ChildId, bytes: &[u8]) -> Result<Vec<u8>, PortalCodecError> {
        let reply = match ipc::decode_call(bytes) {
            Ok(call) => self.handle_portal(id, call.request),
            Err(err) => {
                log::warn!("{}: undecodable portal call: {}", id, err);
                PortalReply::error(PortalError::new(
                    PortalErrorCode::InvalidRequest,
                    err.to_string(),
                ))
            }
        };
        ipc::encode_reply(&reply)
    }
}
