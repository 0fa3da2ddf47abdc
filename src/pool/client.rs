//! Pooled connection handle and bookkeeping.

use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Bookkeeping for a handed-out connection.
///
/// The pool keeps one `Lease` per in-use connection; the borrower's handle
/// shares it. The leak detector works on leases alone, so a reclaimed
/// connection is recognized when its handle finally comes back.
pub(crate) struct Lease {
    id: Uuid,
    host: String,
    taken_at: Instant,
    connected_at: Instant,
    handed_out_count: u32,
    last_action: Mutex<Instant>,
}

impl Lease {
    pub(crate) fn new(id: Uuid, host: &str, connected_at: Instant, handed_out_count: u32) -> Self {
        let now = Instant::now();
        Self {
            id,
            host: host.to_string(),
            taken_at: now,
            connected_at,
            handed_out_count,
            last_action: Mutex::new(now),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn taken_at(&self) -> Instant {
        self.taken_at
    }

    pub(crate) fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub(crate) fn handed_out_count(&self) -> u32 {
        self.handed_out_count
    }

    pub(crate) fn last_action(&self) -> Instant {
        *self.last_action.lock()
    }

    pub(crate) fn touch(&self) {
        *self.last_action.lock() = Instant::now();
    }
}

/// A borrowed connection.
///
/// Dereferences to the raw client. Return it with
/// [`crate::pool::ClientPool::release`]; a handle that is simply dropped
/// closes its raw connection, and the pool reclaims the bookkeeping on its
/// next leak sweep.
pub struct PooledClient<C> {
    pub(crate) client: C,
    pub(crate) lease: Arc<Lease>,
}

impl<C> PooledClient<C> {
    /// Name of the host this connection belongs to.
    pub fn host(&self) -> &str {
        self.lease.host()
    }

    /// Identity of this pooled connection, stable across borrows.
    pub fn id(&self) -> Uuid {
        self.lease.id()
    }

    /// When the raw connection was opened.
    pub fn connected_at(&self) -> Instant {
        self.lease.connected_at()
    }

    /// How many times this connection has been handed out.
    pub fn handed_out_count(&self) -> u32 {
        self.lease.handed_out_count()
    }

    /// Refresh the last-action time, deferring leak reclamation while the
    /// borrower is legitimately still working.
    pub fn touch(&self) {
        self.lease.touch();
    }
}

impl<C> Deref for PooledClient<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C> DerefMut for PooledClient<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.client
    }
}

/// An idle pooled connection.
pub(crate) struct IdleClient<C> {
    pub(crate) client: C,
    pub(crate) id: Uuid,
    pub(crate) connected_at: Instant,
    pub(crate) handed_out_count: u32,
    pub(crate) last_action: Instant,
}

impl<C> IdleClient<C> {
    pub(crate) fn fresh(client: C) -> Self {
        let now = Instant::now();
        Self {
            client,
            id: Uuid::new_v4(),
            connected_at: now,
            handed_out_count: 0,
            last_action: now,
        }
    }
}
