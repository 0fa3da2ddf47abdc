//! Distributor facade over a host list and a selection pattern.

use crate::balance::patterns::{FirstActive, Hashed, LoadPattern, Random, RoundRobin};
use crate::balance::{BalanceError, RouteHint};
use crate::config::PatternKind;
use crate::hosts::{Host, HostList};
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks hosts from a list's active subset using a configured pattern.
pub struct LoadDistributor {
    list: Arc<HostList>,
    pattern: Arc<dyn LoadPattern>,
}

impl LoadDistributor {
    /// Create a distributor with an explicit pattern.
    pub fn new(list: Arc<HostList>, pattern: Arc<dyn LoadPattern>) -> Self {
        Self { list, pattern }
    }

    /// Create a distributor from a configured pattern kind.
    pub fn from_kind(kind: PatternKind, list: Arc<HostList>) -> Self {
        let pattern: Arc<dyn LoadPattern> = match kind {
            PatternKind::FirstActive => Arc::new(FirstActive),
            PatternKind::RoundRobin => Arc::new(RoundRobin::new()),
            PatternKind::Random => Arc::new(Random),
            PatternKind::Hashed => Arc::new(Hashed),
        };
        Self::new(list, pattern)
    }

    /// The host list this distributor selects from.
    pub fn list(&self) -> &Arc<HostList> {
        &self.list
    }

    /// Select a host for the given hint.
    pub fn pick(&self, hint: &RouteHint) -> Result<Arc<Host>, BalanceError> {
        match self.pattern.select(&self.list, hint) {
            Ok(host) => {
                debug!(list = %self.list.name(), host = %host.name, "selected host");
                Ok(host)
            }
            Err(e) => {
                warn!(list = %self.list.name(), error = %e, "host selection failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::patterns::test_support::active_list;

    #[test]
    fn test_round_robin_distribution() {
        let list = Arc::new(active_list(2));
        let distributor = LoadDistributor::from_kind(PatternKind::RoundRobin, list);

        let first = distributor.pick(&RouteHint::none()).unwrap();
        let second = distributor.pick(&RouteHint::none()).unwrap();
        let third = distributor.pick(&RouteHint::none()).unwrap();

        assert_ne!(first.name, second.name);
        assert_eq!(first.name, third.name);
    }

    #[test]
    fn test_no_active_host() {
        let list = Arc::new(HostList::new("empty"));
        let distributor = LoadDistributor::from_kind(PatternKind::FirstActive, list);

        assert_eq!(
            distributor.pick(&RouteHint::none()),
            Err(BalanceError::NoActiveHost)
        );
    }
}
