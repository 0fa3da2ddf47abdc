//! Reachability probe.

use crate::hosts::{Host, HostStatus};
use crate::probe::{HealthProbe, connect_tcp};
use async_trait::async_trait;

/// Reachability probe: the host is `Active` iff a TCP connection can be
/// established within the host's timeout. Unreachable or refused hosts are
/// `Down`; resolution and other unexpected failures are `Error`.
pub struct PingProbe;

#[async_trait]
impl HealthProbe for PingProbe {
    async fn probe(&self, host: &Host) -> HostStatus {
        let status = match connect_tcp(host).await {
            Ok(_stream) => HostStatus::Active,
            Err(status) => status,
        };
        host.mark_checked();
        status
    }
}
