//! A named group of hosts with a separately published active subset.

use crate::hosts::{Host, HostStatus};
use arc_swap::ArcSwap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A named, ordered group of backend hosts plus the subset currently
/// considered healthy.
///
/// The full list is appended to at configuration time only. The active list
/// is rebuilt by the health scheduler and replaced by reference, never
/// mutated in place, so concurrent readers always observe a complete list.
pub struct HostList {
    name: String,
    full: RwLock<Vec<Arc<Host>>>,
    active: ArcSwap<Vec<Arc<Host>>>,
}

impl HostList {
    /// Create an empty list.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full: RwLock::new(Vec::new()),
            active: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Create a list pre-populated with hosts.
    pub fn with_hosts(name: impl Into<String>, hosts: Vec<Arc<Host>>) -> Self {
        let list = Self::new(name);
        *list.full.write() = hosts;
        list
    }

    /// Name of this host group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a host to the full list.
    pub fn add_host(&self, host: Arc<Host>) {
        self.full.write().push(host);
    }

    /// Snapshot of the full list.
    pub fn full(&self) -> Vec<Arc<Host>> {
        self.full.read().clone()
    }

    /// The currently published active list.
    pub fn active(&self) -> Arc<Vec<Arc<Host>>> {
        self.active.load_full()
    }

    /// Atomically replace the active list.
    pub fn store_active(&self, hosts: Vec<Arc<Host>>) {
        self.active.store(Arc::new(hosts));
    }

    /// Look up a host by name in the full list.
    pub fn get(&self, name: &str) -> Option<Arc<Host>> {
        self.full.read().iter().find(|h| h.name == name).cloned()
    }

    /// Number of configured hosts.
    pub fn len(&self) -> usize {
        self.full.read().len()
    }

    /// Whether the list has no hosts configured.
    pub fn is_empty(&self) -> bool {
        self.full.read().is_empty()
    }

    /// Rebuild the active list from the current statuses of the full list.
    pub fn republish_active(&self) {
        let active: Vec<Arc<Host>> = self
            .full
            .read()
            .iter()
            .filter(|h| h.status() == HostStatus::Active)
            .cloned()
            .collect();
        self.store_active(active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_hosts() -> HostList {
        let list = HostList::new("backends");
        for i in 1..=3 {
            list.add_host(Arc::new(Host::new(
                format!("web-{i}"),
                "127.0.0.1",
                8000 + i,
            )));
        }
        list
    }

    #[test]
    fn test_add_and_lookup() {
        let list = three_hosts();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get("web-2").unwrap().port, 8002);
        assert!(list.get("web-9").is_none());
    }

    #[test]
    fn test_active_starts_empty() {
        let list = three_hosts();
        assert!(list.active().is_empty());
    }

    #[test]
    fn test_active_is_replaced_by_reference() {
        let list = three_hosts();
        let before = list.active();

        list.store_active(vec![list.get("web-1").unwrap()]);
        let after = list.active();

        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_republish_filters_by_status() {
        let list = three_hosts();
        list.get("web-1").unwrap().set_status(HostStatus::Active);
        list.get("web-2").unwrap().set_status(HostStatus::Down);
        list.get("web-3").unwrap().set_status(HostStatus::Maintenance);

        list.republish_active();
        let active = list.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "web-1");
    }
}
