//! Uniform random selection.

use super::{LoadPattern, sticky_host};
use crate::balance::{BalanceError, RouteHint};
use crate::hosts::{Host, HostList};
use rand::Rng;
use std::sync::Arc;

/// Picks a uniformly random host from the active list.
pub struct Random;

impl LoadPattern for Random {
    fn select(&self, list: &HostList, hint: &RouteHint) -> Result<Arc<Host>, BalanceError> {
        let active = list.active();
        if active.is_empty() {
            return Err(BalanceError::NoActiveHost);
        }
        if let Some(host) = sticky_host(list, hint) {
            return Ok(host);
        }

        let idx = rand::thread_rng().gen_range(0..active.len());
        Ok(Arc::clone(&active[idx]))
    }
}
