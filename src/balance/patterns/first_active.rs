//! First-active selection.

use super::LoadPattern;
use crate::balance::{BalanceError, RouteHint};
use crate::hosts::{Host, HostList};
use std::sync::Arc;

/// Always returns the first host of the active list: a stable
/// primary/backup pattern where later hosts only serve when earlier ones
/// are unhealthy.
pub struct FirstActive;

impl LoadPattern for FirstActive {
    fn select(&self, list: &HostList, _hint: &RouteHint) -> Result<Arc<Host>, BalanceError> {
        list.active()
            .first()
            .cloned()
            .ok_or(BalanceError::NoActiveHost)
    }
}
