//! Application-supplied connection policy.

use crate::hosts::Host;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens, closes, and keep-alive-probes raw connections for the pool.
///
/// Supplied by the embedding application; the pool is agnostic to the wire
/// protocol behind `Client`. Implementations report failures through return
/// values and never panic.
#[async_trait]
pub trait ClientFactory: Send + Sync + 'static {
    /// The raw connection type.
    type Client: Send + 'static;

    /// Open a connection to the host. Errors are returned as messages for
    /// logging; the pool treats any `Err` as "no connection available".
    async fn connect(&self, host: &Host) -> Result<Self::Client, String>;

    /// Close a connection, consuming it. Returns whether the close was
    /// clean; the pool only logs the outcome.
    async fn disconnect(&self, client: Self::Client) -> bool;

    /// Lightweight liveness probe run against a connection before it is
    /// requeued. Returning `false` discards the connection.
    async fn keep_alive(&self, client: &mut Self::Client) -> bool;

    /// Cheap, non-blocking check whether the transport still looks
    /// connected (e.g. peer has not closed its end).
    fn is_connected(&self, client: &Self::Client) -> bool;
}

/// A shared factory is itself a factory, forwarding to the inner value.
///
/// Lets callers retain a handle (e.g. for metrics) while the pool owns a
/// clone.
#[async_trait]
impl<F: ClientFactory + ?Sized> ClientFactory for Arc<F> {
    type Client = F::Client;

    async fn connect(&self, host: &Host) -> Result<Self::Client, String> {
        (**self).connect(host).await
    }

    async fn disconnect(&self, client: Self::Client) -> bool {
        (**self).disconnect(client).await
    }

    async fn keep_alive(&self, client: &mut Self::Client) -> bool {
        (**self).keep_alive(client).await
    }

    fn is_connected(&self, client: &Self::Client) -> bool {
        (**self).is_connected(client)
    }
}
