//! Host health status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Health status of a backend host.
///
/// `Maintenance` and `Stopped` are operator-set: the health scheduler never
/// overwrites them, so they take a host out of rotation without deleting it.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Not yet probed, or probe could not verify either way.
    #[default]
    Unknown,
    /// Last probe judged the host healthy.
    Active,
    /// Host unreachable, refused, or failed its probe expectations.
    Down,
    /// Probe hit an unexpected internal failure.
    Error,
    /// Operator took the host out of rotation.
    Maintenance,
    /// Operator stopped the host.
    Stopped,
}

impl HostStatus {
    /// Whether the host is eligible for the active list.
    pub fn is_active(self) -> bool {
        self == HostStatus::Active
    }

    /// Whether this status was set by an operator and must never be
    /// overwritten by the scheduler.
    pub fn is_operator_set(self) -> bool {
        matches!(self, HostStatus::Maintenance | HostStatus::Stopped)
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostStatus::Unknown => "unknown",
            HostStatus::Active => "active",
            HostStatus::Down => "down",
            HostStatus::Error => "error",
            HostStatus::Maintenance => "maintenance",
            HostStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_is_active() {
        assert!(HostStatus::Active.is_active());
        assert!(!HostStatus::Unknown.is_active());
        assert!(!HostStatus::Down.is_active());
        assert!(!HostStatus::Maintenance.is_active());
    }

    #[test]
    fn test_operator_set_statuses() {
        assert!(HostStatus::Maintenance.is_operator_set());
        assert!(HostStatus::Stopped.is_operator_set());
        assert!(!HostStatus::Down.is_operator_set());
        assert!(!HostStatus::Error.is_operator_set());
    }

    #[test]
    fn test_status_serde() {
        let status: HostStatus = serde_yaml::from_str("maintenance").unwrap();
        assert_eq!(status, HostStatus::Maintenance);
        assert_eq!(serde_yaml::to_string(&HostStatus::Down).unwrap().trim(), "down");
    }
}
