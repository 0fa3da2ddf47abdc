//! Socket handshake probe.
//!
//! Opens a transport connection (optionally TLS) and verifies configured
//! expectations: a banner the server is expected to send, and/or a
//! request/response exchange.

use crate::hosts::{Host, HostStatus};
use crate::probe::{HealthProbe, TlsConfig, connect_tcp};
use async_trait::async_trait;
use bytes::BytesMut;
use rustls::pki_types::ServerName;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Cap on how much a probe will read looking for expected text.
const MAX_PROBE_READ: usize = 64 * 1024;

trait ProbeStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> ProbeStream for T {}

/// A request to send and the text expected somewhere in the response.
struct Exchange {
    send: String,
    expect: String,
}

/// Socket probe: connects (optionally over TLS), optionally validates a
/// banner against the host's expected text, optionally performs a
/// request/response exchange. `Active` only when every configured
/// expectation holds.
pub struct SocketProbe {
    tls: Option<TlsConfig>,
    exchange: Option<Exchange>,
    close_delay: Option<Duration>,
}

impl SocketProbe {
    /// Plain-TCP probe with no exchange.
    pub fn new() -> Self {
        Self {
            tls: None,
            exchange: None,
            close_delay: None,
        }
    }

    /// Wrap the probe connection in TLS.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Send `send` after connecting and require `expect` in the response.
    pub fn with_exchange(mut self, send: impl Into<String>, expect: impl Into<String>) -> Self {
        self.exchange = Some(Exchange {
            send: send.into(),
            expect: expect.into(),
        });
        self
    }

    /// Wait this long before closing the probe connection, giving the peer
    /// time to finish its handshake.
    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }

    async fn check(&self, host: &Host) -> HostStatus {
        let tcp = match connect_tcp(host).await {
            Ok(stream) => stream,
            Err(status) => return status,
        };

        let mut stream: Box<dyn ProbeStream> = match &self.tls {
            Some(tls) => {
                let name = match ServerName::try_from(host.host.clone()) {
                    Ok(name) => name,
                    Err(e) => {
                        debug!(host = %host.name, error = %e, "invalid tls server name");
                        return HostStatus::Error;
                    }
                };
                let connector = TlsConnector::from(Arc::clone(&tls.client_config));
                match timeout(host.timeout, connector.connect(name, tcp)).await {
                    Ok(Ok(tls_stream)) => Box::new(tls_stream),
                    Ok(Err(e)) => {
                        debug!(host = %host.name, error = %e, "tls handshake failed");
                        return HostStatus::Down;
                    }
                    Err(_) => {
                        debug!(host = %host.name, "tls handshake timed out");
                        return HostStatus::Down;
                    }
                }
            }
            None => Box::new(tcp),
        };

        // Banner check: read until at least as many bytes as the expected
        // text, then look for it.
        if let Some(expected) = &host.expected_text {
            match read_at_least(&mut stream, expected.len(), host.timeout).await {
                Ok(banner) if banner.contains(expected) => {}
                Ok(_) => {
                    debug!(host = %host.name, "banner missing expected text");
                    self.close(stream).await;
                    return HostStatus::Down;
                }
                Err(status) => {
                    self.close(stream).await;
                    return status;
                }
            }
        }

        if let Some(exchange) = &self.exchange {
            if let Err(e) = stream.write_all(exchange.send.as_bytes()).await {
                debug!(host = %host.name, error = %e, "probe request write failed");
                self.close(stream).await;
                return HostStatus::Down;
            }
            match read_until_contains(&mut stream, &exchange.expect, host.timeout).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(host = %host.name, "probe response missing expected text");
                    self.close(stream).await;
                    return HostStatus::Down;
                }
                Err(status) => {
                    self.close(stream).await;
                    return status;
                }
            }
        }

        self.close(stream).await;
        HostStatus::Active
    }

    async fn close(&self, mut stream: Box<dyn ProbeStream>) {
        if let Some(delay) = self.close_delay {
            tokio::time::sleep(delay).await;
        }
        let _ = stream.shutdown().await;
    }
}

impl Default for SocketProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for SocketProbe {
    async fn probe(&self, host: &Host) -> HostStatus {
        let status = self.check(host).await;
        host.mark_checked();
        status
    }
}

/// Read until `min` bytes have accumulated (or EOF), bounded by `limit`.
async fn read_at_least(
    stream: &mut Box<dyn ProbeStream>,
    min: usize,
    limit: Duration,
) -> Result<String, HostStatus> {
    let mut buf = BytesMut::with_capacity(1024);
    let read = timeout(limit, async {
        while buf.len() < min {
            if stream.read_buf(&mut buf).await? == 0 {
                break;
            }
        }
        Ok::<(), io::Error>(())
    })
    .await;

    match read {
        Ok(Ok(())) => Ok(String::from_utf8_lossy(&buf).into_owned()),
        Ok(Err(e)) => {
            debug!(error = %e, "probe read failed");
            Err(HostStatus::Down)
        }
        Err(_) => Err(HostStatus::Down),
    }
}

/// Read until the accumulated response contains `expect`, EOF, or the size
/// cap, bounded by `limit`.
async fn read_until_contains(
    stream: &mut Box<dyn ProbeStream>,
    expect: &str,
    limit: Duration,
) -> Result<bool, HostStatus> {
    let mut buf = BytesMut::with_capacity(1024);
    let read = timeout(limit, async {
        loop {
            if String::from_utf8_lossy(&buf).contains(expect) {
                return Ok::<bool, io::Error>(true);
            }
            if buf.len() >= MAX_PROBE_READ || stream.read_buf(&mut buf).await? == 0 {
                return Ok(String::from_utf8_lossy(&buf).contains(expect));
            }
        }
    })
    .await;

    match read {
        Ok(Ok(found)) => Ok(found),
        Ok(Err(e)) => {
            debug!(error = %e, "probe read failed");
            Err(HostStatus::Down)
        }
        Err(_) => Err(HostStatus::Down),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Server that writes a banner then waits for the peer to close.
    async fn banner_server(banner: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(banner.as_bytes()).await;
                let mut buf = [0u8; 256];
                let _ = stream.read(&mut buf).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn test_banner_match() {
        let port = banner_server("220 mail.example ready\r\n").await;
        let host = Host::new("smtp-1", "127.0.0.1", port).with_expected_text("220");

        assert_eq!(SocketProbe::new().probe(&host).await, HostStatus::Active);
    }

    #[tokio::test]
    async fn test_banner_mismatch() {
        let port = banner_server("554 go away\r\n").await;
        let host = Host::new("smtp-1", "127.0.0.1", port).with_expected_text("220");

        assert_eq!(SocketProbe::new().probe(&host).await, HostStatus::Down);
    }

    #[tokio::test]
    async fn test_no_expectations_connect_is_enough() {
        let port = banner_server("hello").await;
        let host = Host::new("svc-1", "127.0.0.1", port);

        assert_eq!(SocketProbe::new().probe(&host).await, HostStatus::Active);
    }

    #[tokio::test]
    async fn test_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 64];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                if buf[..n].starts_with(b"PING") {
                    let _ = stream.write_all(b"PONG\r\n").await;
                }
            }
        });

        let host = Host::new("svc-1", "127.0.0.1", port);
        let probe = SocketProbe::new().with_exchange("PING\r\n", "PONG");
        assert_eq!(probe.probe(&host).await, HostStatus::Active);
    }

    #[tokio::test]
    async fn test_connection_refused_is_down() {
        let host = Host::new("svc-1", "127.0.0.1", 1);
        assert_eq!(SocketProbe::new().probe(&host).await, HostStatus::Down);
    }
}
