//! Health-aware connection pooling.

mod client;
mod factory;
#[allow(clippy::module_inception)]
mod pool;

pub use client::PooledClient;
pub use factory::ClientFactory;
pub use pool::{ClientPool, HostPoolStats, PoolSettings, PoolStats};
