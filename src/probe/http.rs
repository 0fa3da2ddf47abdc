//! HTTP GET probe.
//!
//! Issues a single hand-rolled request without following redirects and
//! checks the response status (and optionally the body) against the host's
//! expectations.

use crate::hosts::{Host, HostStatus};
use crate::probe::{HealthProbe, connect_tcp};
use async_trait::async_trait;
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Cap on how much of a response body the probe will read.
const MAX_RESPONSE: usize = 64 * 1024;

/// HTTP probe: `Active` iff the response status is in the host's acceptable
/// set (default `{200}`) and, if configured, the expected text appears in
/// the body. Redirects are not followed.
pub struct HttpProbe {
    path: String,
}

impl HttpProbe {
    /// Probe the given path (e.g. `/healthz`).
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    async fn check(&self, host: &Host) -> HostStatus {
        let mut stream = match connect_tcp(host).await {
            Ok(stream) => stream,
            Err(status) => return status,
        };

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            self.path,
            host.addr()
        );
        if let Err(e) = stream.write_all(request.as_bytes()).await {
            debug!(host = %host.name, error = %e, "request write failed");
            return HostStatus::Down;
        }

        // Read the whole response; `Connection: close` bounds it.
        let mut buf = BytesMut::with_capacity(4096);
        let read = timeout(host.timeout, async {
            while buf.len() < MAX_RESPONSE {
                if stream.read_buf(&mut buf).await? == 0 {
                    break;
                }
            }
            Ok::<(), io::Error>(())
        })
        .await;
        match read {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(host = %host.name, error = %e, "response read failed");
                return HostStatus::Down;
            }
            Err(_) => {
                debug!(host = %host.name, "response read timed out");
                return HostStatus::Down;
            }
        }

        let response = String::from_utf8_lossy(&buf);
        let Some(status) = parse_status(&response) else {
            debug!(host = %host.name, "malformed http response");
            return HostStatus::Error;
        };

        let acceptable: &[u16] = host.expected_status.as_deref().unwrap_or(&[200]);
        if !acceptable.contains(&status) {
            debug!(host = %host.name, status, "unexpected response status");
            return HostStatus::Down;
        }

        if let Some(text) = &host.expected_text {
            let body = response
                .split_once("\r\n\r\n")
                .map(|(_, body)| body)
                .unwrap_or("");
            if !body.contains(text.as_str()) {
                debug!(host = %host.name, "body missing expected text");
                return HostStatus::Down;
            }
        }

        HostStatus::Active
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, host: &Host) -> HostStatus {
        let status = self.check(host).await;
        host.mark_checked();
        status
    }
}

/// Parse the status code from a response like `HTTP/1.1 200 OK`.
fn parse_status(response: &str) -> Option<u16> {
    let mut parts = response.split_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}
