//! Port registry: maps a logical port number to the mailbox of the consumer
//! subscribed to it. The original firmware keeps these entries in a
//! singly-linked list (`utlist.h`'s `LL_PREPEND`/`LL_SEARCH_SCALAR`); as the
//! design notes allow, this is a `Vec` behind a mutex instead, since the
//! expected number of ports is small and Rust has no equivalent zero-cost
//! intrusive list without unsafe code the rest of this crate doesn't need.

use crate::message::ClientMailbox;
use std::sync::Mutex;

struct PortEntry {
    port: u16,
    mailbox: ClientMailbox,
}

#[derive(Default)]
pub struct PortRegistry {
    entries: Mutex<Vec<PortEntry>>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Registers `mailbox` under `port`, at the head of the list. Duplicate
    /// ports are accepted silently; `lookup` scans from the head, so on a
    /// duplicate port the most recently registered entry wins, mirroring
    /// `LL_PREPEND` + `LL_SEARCH_SCALAR` over an ordered list.
    pub fn register(&self, port: u16, mailbox: ClientMailbox) {
        self.entries.lock().unwrap().insert(0, PortEntry { port, mailbox });
    }

    /// Removes the first entry matching `port`, if any.
    pub fn unregister(&self, port: u16) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(idx) = entries.iter().position(|e| e.port == port) {
            entries.remove(idx);
        }
    }

    pub fn lookup(&self, port: u16) -> Option<ClientMailbox> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.port == port)
            .map(|e| e.mailbox.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ClientEndpoint;

    #[test]
    fn lookup_misses_unregistered_port() {
        let registry = PortRegistry::new();
        assert!(registry.lookup(42).is_none());
    }

    #[test]
    fn lookup_finds_most_recently_registered_on_duplicate_port() {
        let registry = PortRegistry::new();
        let a = ClientEndpoint::new(4);
        let b = ClientEndpoint::new(4);
        registry.register(7, a.sender.clone());
        registry.register(7, b.sender.clone());

        let found = registry.lookup(7).unwrap();
        found.try_send(crate::message::ClientMsg::SendSuccess).unwrap();
        assert!(b.receiver.try_recv().is_ok());
        assert!(a.receiver.try_recv().is_err());
    }

    #[test]
    fn unregister_removes_the_entry() {
        let registry = PortRegistry::new();
        let a = ClientEndpoint::new(4);
        registry.register(1, a.sender.clone());
        registry.unregister(1);
        assert!(registry.lookup(1).is_none());
    }
}
