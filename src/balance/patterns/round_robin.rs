//! Round-robin selection.

use super::{LoadPattern, sticky_host};
use crate::balance::{BalanceError, RouteHint};
use crate::hosts::{Host, HostList};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin pattern with a single shared cursor.
///
/// The cursor advances atomically and is reduced modulo the current active
/// length; fairness across an active-list resize is best-effort.
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    /// Create a round-robin pattern starting at the first host.
    pub fn new() -> Self {
        Self {
            cursor: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadPattern for RoundRobin {
    fn select(&self, list: &HostList, hint: &RouteHint) -> Result<Arc<Host>, BalanceError> {
        let active = list.active();
        if active.is_empty() {
            return Err(BalanceError::NoActiveHost);
        }
        if let Some(host) = sticky_host(list, hint) {
            return Ok(host);
        }

        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % active.len();
        Ok(Arc::clone(&active[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::patterns::test_support::active_list;

    #[test]
    fn test_cycles_through_all_hosts() {
        let list = active_list(3);
        let rr = RoundRobin::new();

        let names: Vec<String> = (0..4)
            .map(|_| rr.select(&list, &RouteHint::none()).unwrap().name.clone())
            .collect();

        assert_eq!(names, ["web-1", "web-2", "web-3", "web-1"]);
    }

    #[test]
    fn test_visits_each_host_once_per_cycle() {
        let list = active_list(5);
        let rr = RoundRobin::new();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            seen.insert(rr.select(&list, &RouteHint::none()).unwrap().name.clone());
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_sticky_overrides_cursor() {
        let list = active_list(3);
        let rr = RoundRobin::new();
        let hint = RouteHint::to_host("web-3");

        for _ in 0..3 {
            assert_eq!(rr.select(&list, &hint).unwrap().name, "web-3");
        }
    }

    #[test]
    fn test_empty_active_list() {
        let list = HostList::new("empty");
        assert_eq!(
            RoundRobin::new().select(&list, &RouteHint::none()),
            Err(BalanceError::NoActiveHost)
        );
    }
}
