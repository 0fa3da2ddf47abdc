//! Host selection patterns.

mod first_active;
mod hashed;
mod random;
mod round_robin;

pub use first_active::FirstActive;
pub use hashed::Hashed;
pub use random::Random;
pub use round_robin::RoundRobin;

use crate::balance::{BalanceError, RouteHint};
use crate::hosts::{Host, HostList, HostStatus};
use std::sync::Arc;

/// Strategy for picking one host from a list's active subset.
pub trait LoadPattern: Send + Sync {
    /// Select a host, honoring the hint where the pattern supports it.
    ///
    /// Returns [`BalanceError::NoActiveHost`] when the active list is empty.
    fn select(&self, list: &HostList, hint: &RouteHint) -> Result<Arc<Host>, BalanceError>;
}

/// Sticky routing shared by the round-robin, random, and hashed patterns:
/// if the hint names a host and that host is currently active (checked
/// against the full list, not only the published active subset), return it
/// directly, bypassing the pattern's own algorithm.
pub(crate) fn sticky_host(list: &HostList, hint: &RouteHint) -> Option<Arc<Host>> {
    hint.host_name
        .as_deref()
        .and_then(|name| list.get(name))
        .filter(|host| host.status() == HostStatus::Active)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A list of `count` active hosts named `web-1..=count`.
    pub fn active_list(count: usize) -> HostList {
        let list = HostList::new("backends");
        for i in 1..=count {
            let host = Arc::new(Host::new(format!("web-{i}"), "127.0.0.1", 8000 + i as u16));
            host.set_status(HostStatus::Active);
            list.add_host(host);
        }
        list.republish_active();
        list
    }
}
