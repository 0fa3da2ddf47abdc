//! Health probes.
//!
//! A probe examines one host and reports its observed status. Probes never
//! fail outward: every transport or protocol error is mapped to a
//! [`HostStatus`] internally.

mod datagram;
mod http;
mod ping;
mod socket;
mod tls;

pub use datagram::DatagramProbe;
pub use http::HttpProbe;
pub use ping::PingProbe;
pub use socket::SocketProbe;
pub use tls::TlsConfig;

use crate::config::{ProbeKind, ProbeSettings};
use crate::hosts::{Host, HostStatus};
use async_trait::async_trait;
use std::io;
use std::sync::Arc;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::timeout;
use tracing::debug;

/// Strategy for checking the health of a single host.
///
/// Implementations stamp `host.last_checked` and map all errors to a status.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Probe one host and report its observed status.
    async fn probe(&self, host: &Host) -> HostStatus;
}

/// Build a probe from configuration.
pub fn build_probe(settings: &ProbeSettings) -> Result<Arc<dyn HealthProbe>, String> {
    let probe: Arc<dyn HealthProbe> = match settings.kind {
        ProbeKind::Ping => Arc::new(PingProbe),
        ProbeKind::Socket => {
            let mut probe = SocketProbe::new();
            if settings.tls {
                probe = probe.with_tls(TlsConfig::with_system_roots()?);
            }
            if let (Some(send), Some(expect)) = (&settings.request, &settings.expect) {
                probe = probe.with_exchange(send.clone(), expect.clone());
            }
            if let Some(delay) = settings.close_delay {
                probe = probe.with_close_delay(delay);
            }
            Arc::new(probe)
        }
        ProbeKind::Http => Arc::new(HttpProbe::new(
            settings.path.clone().unwrap_or_else(|| "/".to_string()),
        )),
        ProbeKind::Datagram => Arc::new(DatagramProbe::new(
            settings
                .payload
                .clone()
                .unwrap_or_else(|| "ping".to_string())
                .into_bytes(),
        )),
    };
    Ok(probe)
}

/// Resolve and connect to a host within its configured timeout.
///
/// Maps resolution failures to `Error` and unreachable/refused/timed-out
/// connections to `Down`.
pub(crate) async fn connect_tcp(host: &Host) -> Result<TcpStream, HostStatus> {
    let mut addrs = match timeout(host.timeout, lookup_host(host.addr())).await {
        Ok(Ok(addrs)) => addrs,
        Ok(Err(e)) => {
            debug!(host = %host.name, error = %e, "address resolution failed");
            return Err(HostStatus::Error);
        }
        Err(_) => {
            debug!(host = %host.name, "address resolution timed out");
            return Err(HostStatus::Error);
        }
    };
    let Some(addr) = addrs.next() else {
        debug!(host = %host.name, "no address resolved");
        return Err(HostStatus::Error);
    };

    match timeout(host.timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            debug!(host = %host.name, error = %e, "connect failed");
            Err(classify_io_error(&e))
        }
        Err(_) => {
            debug!(host = %host.name, "connect timed out");
            Err(HostStatus::Down)
        }
    }
}

/// Expected unreachability maps to `Down`; anything else is `Error`.
pub(crate) fn classify_io_error(e: &io::Error) -> HostStatus {
    match e.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::TimedOut => HostStatus::Down,
        _ => HostStatus::Error,
    }
}
