//! A registered monitoring task.

use crate::hosts::HostList;
use crate::monitor::StatusListener;
use crate::probe::HealthProbe;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Binds one host list, one probe, a check interval, and the listeners to
/// notify on status transitions.
pub struct MonitoringTask {
    list: Arc<HostList>,
    probe: Arc<dyn HealthProbe>,
    interval: Duration,
    listeners: RwLock<Vec<Arc<dyn StatusListener>>>,
    next_due: Mutex<Option<Instant>>,
}

impl MonitoringTask {
    pub(crate) fn new(
        list: Arc<HostList>,
        probe: Arc<dyn HealthProbe>,
        interval: Duration,
    ) -> Self {
        Self {
            list,
            probe,
            interval,
            listeners: RwLock::new(Vec::new()),
            next_due: Mutex::new(None),
        }
    }

    /// The monitored host list.
    pub fn list(&self) -> &Arc<HostList> {
        &self.list
    }

    /// The probe used for this task.
    pub fn probe(&self) -> &Arc<dyn HealthProbe> {
        &self.probe
    }

    /// Per-host re-check interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Register a transition listener.
    pub fn add_listener(&self, listener: Arc<dyn StatusListener>) {
        self.listeners.write().push(listener);
    }

    pub(crate) fn listeners(&self) -> Vec<Arc<dyn StatusListener>> {
        self.listeners.read().clone()
    }

    /// Whether the task should be swept at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match *self.next_due.lock() {
            None => true,
            Some(at) => now >= at,
        }
    }

    pub(crate) fn set_next_due(&self, at: Instant) {
        *self.next_due.lock() = Some(at);
    }
}
