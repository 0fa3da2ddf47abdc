//! hostpool - a resilient client-side connection pool
//!
//! This crate provides a health-aware connection pooling engine:
//! - Host registry with per-host health status and an atomically published
//!   active subset
//! - Pluggable health probes (reachability, socket/TLS handshake, HTTP,
//!   datagram)
//! - A periodic health scheduler shared across pools, with transition
//!   notifications
//! - Pluggable load balancing patterns (first-active, round-robin, random,
//!   hashed) with sticky routing
//! - Per-host elastic connection pools with keep-alive probing on return
//!   and leak detection
//!
//! The transport is supplied by the application through
//! [`pool::ClientFactory`]; hostpool never speaks a wire protocol itself.

pub mod balance;
pub mod config;
pub mod hosts;
pub mod metrics;
pub mod monitor;
pub mod pool;
pub mod probe;
pub mod util;

pub use config::Config;
