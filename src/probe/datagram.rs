//! Datagram (UDP) probe.

use crate::hosts::{Host, HostStatus};
use crate::probe::HealthProbe;
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::debug;

/// Datagram probe: sends a fixed payload and waits for a response containing
/// the host's expected text. Without a configured expectation the result
/// cannot be verified and the probe reports `Unknown`.
pub struct DatagramProbe {
    payload: Vec<u8>,
}

impl DatagramProbe {
    /// Probe with the given request payload.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    async fn check(&self, host: &Host) -> HostStatus {
        let Some(expected) = &host.expected_text else {
            debug!(host = %host.name, "no response expectation configured, cannot verify");
            return HostStatus::Unknown;
        };

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(e) => {
                debug!(host = %host.name, error = %e, "udp socket setup failed");
                return HostStatus::Error;
            }
        };
        if let Err(e) = socket.connect(host.addr()).await {
            debug!(host = %host.name, error = %e, "udp connect failed");
            return HostStatus::Error;
        }

        if let Err(e) = socket.send(&self.payload).await {
            debug!(host = %host.name, error = %e, "udp send failed");
            return HostStatus::Down;
        }

        let mut buf = [0u8; 2048];
        match timeout(host.timeout, socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                if String::from_utf8_lossy(&buf[..n]).contains(expected.as_str()) {
                    HostStatus::Active
                } else {
                    debug!(host = %host.name, "udp response missing expected text");
                    HostStatus::Down
                }
            }
            Ok(Err(e)) => {
                debug!(host = %host.name, error = %e, "udp receive failed");
                HostStatus::Down
            }
            Err(_) => {
                debug!(host = %host.name, "no udp response within timeout");
                HostStatus::Down
            }
        }
    }
}

#[async_trait]
impl HealthProbe for DatagramProbe {
    async fn probe(&self, host: &Host) -> HostStatus {
        let status = self.check(host).await;
        host.mark_checked();
        status
    }
}
