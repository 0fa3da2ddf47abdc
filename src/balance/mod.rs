//! Load balancing across the active host subset.

mod distributor;
pub mod patterns;

pub use distributor::LoadDistributor;
pub use patterns::{FirstActive, Hashed, LoadPattern, Random, RoundRobin};

use thiserror::Error;

/// Routing preferences a caller may attach to a borrow.
#[derive(Debug, Clone, Default)]
pub struct RouteHint {
    /// Pin the selection to this host while it stays healthy.
    pub host_name: Option<String>,
    /// Key for deterministic (hashed) selection.
    pub routing_key: Option<String>,
}

impl RouteHint {
    /// No preference: let the pattern decide.
    pub fn none() -> Self {
        Self::default()
    }

    /// Prefer the named host while it is active.
    pub fn to_host(name: impl Into<String>) -> Self {
        Self {
            host_name: Some(name.into()),
            routing_key: None,
        }
    }

    /// Route by key (hashed pattern).
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            host_name: None,
            routing_key: Some(key.into()),
        }
    }
}

/// Errors from host selection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BalanceError {
    /// The active list is empty; the caller should treat this as
    /// "no connection available" and retry or fail upward.
    #[error("no active host available")]
    NoActiveHost,

    /// The hashed pattern was called without a routing key or host hint.
    #[error("hashed selection requires a routing key or host name hint")]
    MissingKey,
}
