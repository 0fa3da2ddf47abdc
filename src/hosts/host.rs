//! A single configured backend host.

use crate::hosts::HostStatus;
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// A configured backend endpoint with mutable health state.
///
/// Identity (`name`, `host`, `port`) and probe parameters are fixed at
/// configuration time. Health state is written by the health scheduler,
/// except for operator-set statuses (see [`HostStatus::is_operator_set`]).
#[derive(Debug)]
pub struct Host {
    /// Unique logical name.
    pub name: String,
    /// Hostname or IP address.
    pub host: String,
    /// Port.
    pub port: u16,
    /// Text a probe expects to find in a banner, response, or body.
    pub expected_text: Option<String>,
    /// Acceptable HTTP status codes for the request/response probe.
    pub expected_status: Option<Vec<u16>>,
    /// Per-probe timeout for this host.
    pub timeout: Duration,

    state: RwLock<HostState>,
}

/// Hosts compare by their fixed identity (`name`, `host`, `port`); mutable
/// health state is excluded. `RwLock<HostState>` is not `PartialEq`, so this
/// cannot be derived.
impl PartialEq for Host {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.host == other.host && self.port == other.port
    }
}

#[derive(Debug)]
struct HostState {
    status: HostStatus,
    last_checked: Option<Instant>,
    next_check: Option<Instant>,
}

impl Host {
    /// Create a host with default probe parameters (5s timeout, no
    /// expectations) and `Unknown` status.
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            expected_text: None,
            expected_status: None,
            timeout: Duration::from_secs(5),
            state: RwLock::new(HostState {
                status: HostStatus::Unknown,
                last_checked: None,
                next_check: None,
            }),
        }
    }

    /// Set the text expectation used by banner/response/body checks.
    pub fn with_expected_text(mut self, text: impl Into<String>) -> Self {
        self.expected_text = Some(text.into());
        self
    }

    /// Set the acceptable HTTP status codes.
    pub fn with_expected_status(mut self, codes: Vec<u16>) -> Self {
        self.expected_status = Some(codes);
        self
    }

    /// Set the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port`, suitable for address resolution.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Current health status.
    pub fn status(&self) -> HostStatus {
        self.state.read().status
    }

    /// Overwrite the health status.
    ///
    /// Written by the health scheduler; applications use it to set
    /// `Maintenance`/`Stopped`, which the scheduler then leaves alone.
    pub fn set_status(&self, status: HostStatus) {
        self.state.write().status = status;
    }

    /// When this host was last probed, if ever.
    pub fn last_checked(&self) -> Option<Instant> {
        self.state.read().last_checked
    }

    /// Stamp the host as probed just now. Called by every probe.
    pub fn mark_checked(&self) {
        self.state.write().last_checked = Some(Instant::now());
    }

    /// When the host is next due for a probe. `None` means due immediately.
    pub fn next_check(&self) -> Option<Instant> {
        self.state.read().next_check
    }

    /// Schedule the next probe.
    pub fn set_next_check(&self, at: Option<Instant>) {
        self.state.write().next_check = at;
    }

    /// Whether the host is due for a probe at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.state.read().next_check {
            None => true,
            Some(at) => now >= at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_host_is_unknown_and_due() {
        let host = Host::new("web-1", "127.0.0.1", 8080);
        assert_eq!(host.status(), HostStatus::Unknown);
        assert!(host.is_due(Instant::now()));
        assert_eq!(host.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_due_time_honored() {
        let host = Host::new("web-1", "127.0.0.1", 8080);
        let now = Instant::now();

        host.set_next_check(Some(now + Duration::from_secs(10)));
        assert!(!host.is_due(now));
        assert!(host.is_due(now + Duration::from_secs(10)));
    }

    #[test]
    fn test_mark_checked_updates_timestamp() {
        let host = Host::new("web-1", "127.0.0.1", 8080);
        assert!(host.last_checked().is_none());

        host.mark_checked();
        assert!(host.last_checked().is_some());
    }

    #[test]
    fn test_builder_parameters() {
        let host = Host::new("api", "api.internal", 443)
            .with_expected_text("pong")
            .with_expected_status(vec![200, 204])
            .with_timeout(Duration::from_secs(2));

        assert_eq!(host.expected_text.as_deref(), Some("pong"));
        assert_eq!(host.expected_status.as_deref(), Some(&[200, 204][..]));
        assert_eq!(host.timeout, Duration::from_secs(2));
    }
}
