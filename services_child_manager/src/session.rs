//! Per-child session table

use core_types::CapSel;
use ipc::ClientSession;
use std::collections::BTreeMap;

/// Open sessions of one child, keyed by their capability handle
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: BTreeMap<CapSel, ClientSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a session; returns false if its handle is already present.
    pub fn insert(&mut self, session: ClientSession) -> bool {
        if self.sessions.contains_key(&session.handle) {
            return false;
        }
        self.sessions.insert(session.handle, session);
        true
    }

    pub fn remove(&mut self, handle: CapSel) -> Option<ClientSession> {
        self.sessions.remove(&handle)
    }

    pub fn get(&self, handle: CapSel) -> Option<&ClientSession> {
        self.sessions.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession> {
        self.sessions.values()
    }

    /// Removes and returns every session.
    pub fn drain(&mut self) -> Vec<ClientSession> {
        std::mem::take(&mut self.sessions).into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::ServiceId;

    fn session(handle: u64, service: &str) -> ClientSession {
        ClientSession::new(CapSel::new(handle), service, ServiceId::new(), "")
    }

    #[test]
    fn test_insert_unique_handles() {
        let mut table = SessionTable::new();
        assert!(table.insert(session(1, "log")));
        assert!(!table.insert(session(1, "timer")));
        assert_eq!(table.get(CapSel::new(1)).map(|s| s.service.as_str()), Some("log"));
    }

    #[test]
    fn test_remove_once() {
        let mut table = SessionTable::new();
        table.insert(session(1, "log"));
        assert!(table.remove(CapSel::new(1)).is_some());
        assert!(table.remove(CapSel::new(1)).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_drain_in_handle_order() {
        let mut table = SessionTable::new();
        table.insert(session(1, "log"));
        table.insert(session(2, "disk"));
        table.insert(session(3, "log"));
        assert_eq!(table.len(), 3);

        let drained = table.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].handle, CapSel::new(1));
        assert_eq!(table.len(), 0);
    }
}
