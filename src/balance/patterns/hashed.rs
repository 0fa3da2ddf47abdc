//! Deterministic hashed selection.

use super::{LoadPattern, sticky_host};
use crate::balance::{BalanceError, RouteHint};
use crate::hosts::{Host, HostList};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Routes a key deterministically to a host: the same key always maps to
/// the same index for a fixed active-list size.
///
/// The key is the hint's routing key, falling back to its host name; a hint
/// carrying neither is a caller error.
pub struct Hashed;

impl LoadPattern for Hashed {
    fn select(&self, list: &HostList, hint: &RouteHint) -> Result<Arc<Host>, BalanceError> {
        let active = list.active();
        if active.is_empty() {
            return Err(BalanceError::NoActiveHost);
        }
        if let Some(host) = sticky_host(list, hint) {
            return Ok(host);
        }

        let key = hint
            .routing_key
            .as_deref()
            .or(hint.host_name.as_deref())
            .ok_or(BalanceError::MissingKey)?;

        let mut hasher = std::hash::DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % active.len();
        Ok(Arc::clone(&active[idx]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balance::patterns::test_support::active_list;

    #[test]
    fn test_same_key_same_host() {
        let list = active_list(5);
        let hint = RouteHint::keyed("session-1234");

        let first = Hashed.select(&list, &hint).unwrap();
        for _ in 0..10 {
            assert_eq!(Hashed.select(&list, &hint).unwrap().name, first.name);
        }
    }

    #[test]
    fn test_different_keys_spread() {
        let list = active_list(5);

        let mut seen = std::collections::HashSet::new();
        for i in 0..100 {
            let hint = RouteHint::keyed(format!("session-{i}"));
            seen.insert(Hashed.select(&list, &hint).unwrap().name.clone());
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_missing_key_is_hard_error() {
        let list = active_list(3);
        assert_eq!(
            Hashed.select(&list, &RouteHint::none()),
            Err(BalanceError::MissingKey)
        );
    }

    #[test]
    fn test_host_name_hint_used_as_key_when_inactive() {
        let list = active_list(3);
        list.get("web-2").unwrap().set_status(crate::hosts::HostStatus::Down);

        // Named host is not active, so the name degrades to a hash key
        // rather than a sticky target.
        let hint = RouteHint::to_host("web-2");
        assert!(Hashed.select(&list, &hint).is_ok());
    }

    #[test]
    fn test_empty_active_list() {
        let list = HostList::new("empty");
        assert_eq!(
            Hashed.select(&list, &RouteHint::keyed("k")),
            Err(BalanceError::NoActiveHost)
        );
    }
}
