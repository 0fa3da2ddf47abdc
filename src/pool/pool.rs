//! Per-host connection pools with load-balanced borrow and return.
//!
//! One coarse read-write lock per pool guards structural operations (grow,
//! shrink, drain, shutdown). Hot paths touch only the per-host queues; the
//! few that need the coarse lock acquire it with a bounded timeout and
//! treat a miss as "try again later" rather than blocking indefinitely.

use crate::balance::{BalanceError, LoadDistributor, RouteHint};
use crate::hosts::{Host, HostStatus};
use crate::metrics::MetricsCollector;
use crate::monitor::{HealthScheduler, MonitoringTask, StatusListener};
use crate::pool::client::{IdleClient, Lease, PooledClient};
use crate::pool::factory::ClientFactory;
use crate::probe::HealthProbe;
use crate::util::ShutdownSignal;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Notify, mpsc};
use tokio::time::{MissedTickBehavior, interval, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Attempts and per-attempt wait used when `block_when_empty` polls for a
/// returned connection at capacity.
const BLOCK_ATTEMPTS: usize = 10;
const BLOCK_WAIT: Duration = Duration::from_millis(500);

/// Returns within this window skip the keep-alive probe.
const FAST_RETURN_WINDOW: Duration = Duration::from_secs(1);

/// Sizing and cadence settings for a [`ClientPool`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Floor for per-host idle+in-use connections while the host is active.
    pub min_pool_size: usize,
    /// Idle connections above this are closed by the sweep.
    pub idle_pool_size: usize,
    /// Hard ceiling on per-host idle+in-use connections.
    pub max_pool_size: usize,
    /// Borrow polls briefly instead of failing immediately at capacity.
    pub block_when_empty: bool,
    /// Health re-check cadence; also caps the return fast-path window.
    pub host_monitoring_interval: Duration,
    /// Borrowed connections quiet for longer than this are reclaimed.
    pub max_borrow_interval: Duration,
    /// Cadence of the keep-alive/leak/resize sweep.
    pub noop_interval: Duration,
    /// Bound on coarse-lock acquisition from hot paths.
    pub lock_timeout: Duration,
    /// Cadence of the periodic stats log; `None` disables it.
    pub stats_interval: Option<Duration>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_pool_size: 1,
            idle_pool_size: 2,
            max_pool_size: 4,
            block_when_empty: false,
            host_monitoring_interval: Duration::from_secs(10),
            max_borrow_interval: Duration::from_secs(60),
            noop_interval: Duration::from_secs(5),
            lock_timeout: Duration::from_secs(2),
            stats_interval: None,
        }
    }
}

/// Idle and in-use queues for one host.
struct HostSlot<C> {
    idle: Mutex<VecDeque<IdleClient<C>>>,
    in_use: Mutex<Vec<Arc<Lease>>>,
    returned: Notify,
}

impl<C> HostSlot<C> {
    fn new() -> Self {
        Self {
            idle: Mutex::new(VecDeque::new()),
            in_use: Mutex::new(Vec::new()),
            returned: Notify::new(),
        }
    }

    fn idle_len(&self) -> usize {
        self.idle.lock().len()
    }

    fn in_use_len(&self) -> usize {
        self.in_use.lock().len()
    }

    fn total(&self) -> usize {
        self.idle_len() + self.in_use_len()
    }
}

/// Point-in-time pool counts.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub hosts: Vec<HostPoolStats>,
}

/// Counts for one host. `None` means the queue was contended when the
/// snapshot was taken and the count is not available right now.
#[derive(Debug, Clone)]
pub struct HostPoolStats {
    pub host: String,
    pub status: HostStatus,
    pub idle: Option<usize>,
    pub in_use: Option<usize>,
}

/// Forwards scheduler transitions into the pool's event loop.
struct PoolListener {
    events: mpsc::UnboundedSender<(String, HostStatus, HostStatus)>,
}

impl StatusListener for PoolListener {
    fn on_transition(&self, host: &Host, old: HostStatus, new: HostStatus) {
        let _ = self.events.send((host.name.clone(), old, new));
    }
}

/// Load-balanced, health-aware, elastically sized connection pool.
pub struct ClientPool<F: ClientFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ClientFactory> Clone for ClientPool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<F: ClientFactory> {
    factory: F,
    settings: PoolSettings,
    distributor: LoadDistributor,
    slots: DashMap<String, Arc<HostSlot<F::Client>>>,
    lock: tokio::sync::RwLock<()>,
    shutdown: ShutdownSignal,
    metrics: Option<MetricsCollector>,
    leaks_reclaimed: AtomicU64,
}

impl<F: ClientFactory> ClientPool<F> {
    /// Create a pool over the distributor's host list.
    pub fn new(distributor: LoadDistributor, factory: F, settings: PoolSettings) -> Self {
        Self::build(distributor, factory, settings, None)
    }

    /// Create a pool that reports into the given metrics collector.
    pub fn with_metrics(
        distributor: LoadDistributor,
        factory: F,
        settings: PoolSettings,
        metrics: MetricsCollector,
    ) -> Self {
        Self::build(distributor, factory, settings, Some(metrics))
    }

    fn build(
        distributor: LoadDistributor,
        factory: F,
        settings: PoolSettings,
        metrics: Option<MetricsCollector>,
    ) -> Self {
        let slots = DashMap::new();
        for host in distributor.list().full() {
            slots.insert(host.name.clone(), Arc::new(HostSlot::new()));
        }
        Self {
            inner: Arc::new(PoolInner {
                factory,
                settings,
                distributor,
                slots,
                lock: tokio::sync::RwLock::new(()),
                shutdown: ShutdownSignal::new(),
                metrics,
                leaks_reclaimed: AtomicU64::new(0),
            }),
        }
    }

    /// Register with the scheduler, establish initial host statuses, fill
    /// active hosts to the floor, and spawn the background loops.
    ///
    /// Returns the monitoring task so the caller can attach more listeners
    /// or force checks.
    pub async fn start(
        &self,
        scheduler: &Arc<HealthScheduler>,
        probe: Arc<dyn HealthProbe>,
    ) -> Arc<MonitoringTask> {
        let inner = &self.inner;
        let task = scheduler.register(
            Arc::clone(inner.distributor.list()),
            probe,
            inner.settings.host_monitoring_interval,
        );

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        task.add_listener(Arc::new(PoolListener { events: events_tx }));

        scheduler.force_check(&task).await;
        for host in inner.distributor.list().full() {
            if host.status() == HostStatus::Active {
                inner.increase_size(&host).await;
            }
        }

        // Health transition loop: grow on recovery, drain on failure.
        {
            let inner = Arc::clone(&self.inner);
            let mut shutdown = inner.shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        event = events_rx.recv() => match event {
                            Some((name, old, new)) => {
                                if new == HostStatus::Active {
                                    if let Some(host) = inner.distributor.list().get(&name) {
                                        inner.increase_size(&host).await;
                                    }
                                } else if old == HostStatus::Active {
                                    inner.drain_host(&name).await;
                                }
                            }
                            None => break,
                        },
                        _ = shutdown.recv() => break,
                    }
                }
            });
        }

        // Keep-alive / leak / resize sweep loop.
        {
            let inner = Arc::clone(&self.inner);
            let mut shutdown = inner.shutdown.subscribe();
            tokio::spawn(async move {
                let mut tick = interval(inner.settings.noop_interval);
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = tick.tick() => inner.sweep().await,
                        _ = shutdown.recv() => {
                            debug!("pool sweep loop stopping");
                            break;
                        }
                    }
                }
            });
        }

        // Optional stats loop.
        if let Some(every) = inner.settings.stats_interval {
            let inner = Arc::clone(&self.inner);
            let mut shutdown = inner.shutdown.subscribe();
            tokio::spawn(async move {
                let mut tick = interval(every);
                tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            for host in inner.stats_snapshot().hosts {
                                info!(
                                    host = %host.host,
                                    status = %host.status,
                                    idle = %display_count(host.idle),
                                    in_use = %display_count(host.in_use),
                                    "pool stats"
                                );
                            }
                        }
                        _ = shutdown.recv() => break,
                    }
                }
            });
        }

        info!(list = %inner.distributor.list().name(), "connection pool started");
        task
    }

    /// Borrow a connection.
    ///
    /// `Ok(None)` means no connection is available right now (no active
    /// host, capacity exhausted, or the pool lock is contended); the caller
    /// retries or fails upward. `Err` is reserved for caller mistakes such
    /// as hashed routing without a key.
    pub async fn get(
        &self,
        hint: &RouteHint,
    ) -> Result<Option<PooledClient<F::Client>>, BalanceError> {
        let inner = &self.inner;
        let host = match inner.distributor.pick(hint) {
            Ok(host) => host,
            Err(BalanceError::NoActiveHost) => {
                inner.note_unavailable();
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let status = host.status();
        if status != HostStatus::Active && status != HostStatus::Unknown {
            inner.note_unavailable();
            return Ok(None);
        }

        let slot = inner.slot(&host.name);

        if let Some(handle) = inner.try_take_idle(&slot, &host.name) {
            return Ok(Some(handle));
        }

        if slot.total() < inner.settings.max_pool_size {
            match timeout(inner.settings.lock_timeout, inner.lock.read()).await {
                Ok(_guard) => {
                    if slot.total() < inner.settings.max_pool_size {
                        match inner.factory.connect(&host).await {
                            Ok(client) => {
                                let lease = Arc::new(Lease::new(
                                    Uuid::new_v4(),
                                    &host.name,
                                    Instant::now(),
                                    1,
                                ));
                                slot.in_use.lock().push(Arc::clone(&lease));
                                debug!(host = %host.name, id = %lease.id(), "opened connection for borrow");
                                return Ok(Some(PooledClient { client, lease }));
                            }
                            Err(e) => {
                                warn!(host = %host.name, error = %e, "failed to open connection");
                                inner.note_unavailable();
                                return Ok(None);
                            }
                        }
                    }
                }
                Err(_) => {
                    warn!(host = %host.name, "pool lock timed out, failing borrow");
                    inner.note_unavailable();
                    return Ok(None);
                }
            }
        }

        if inner.settings.block_when_empty {
            for _ in 0..BLOCK_ATTEMPTS {
                let _ = timeout(BLOCK_WAIT, slot.returned.notified()).await;
                if let Some(handle) = inner.try_take_idle(&slot, &host.name) {
                    return Ok(Some(handle));
                }
            }
            debug!(host = %host.name, "gave up waiting for a returned connection");
        }

        inner.note_unavailable();
        Ok(None)
    }

    /// Return a borrowed connection.
    ///
    /// Dead or reclaimed connections are discarded; a connection failing
    /// its keep-alive is transparently replaced so the pool size survives a
    /// stale connection. Never fails outward.
    pub async fn release(&self, handle: PooledClient<F::Client>) {
        let inner = &self.inner;
        let PooledClient { client, lease } = handle;

        let Some(slot) = inner.slots.get(lease.host()).map(|e| Arc::clone(e.value())) else {
            let _ = inner.factory.disconnect(client).await;
            return;
        };

        let still_leased = {
            let mut in_use = slot.in_use.lock();
            match in_use.iter().position(|l| l.id() == lease.id()) {
                Some(idx) => {
                    in_use.swap_remove(idx);
                    true
                }
                None => false,
            }
        };
        if !still_leased {
            debug!(host = %lease.host(), id = %lease.id(), "connection was reclaimed while borrowed, discarding");
            let _ = inner.factory.disconnect(client).await;
            return;
        }

        if !inner.factory.is_connected(&client) {
            debug!(host = %lease.host(), id = %lease.id(), "transport disconnected, discarding");
            let _ = inner.factory.disconnect(client).await;
            return;
        }

        // Fast path: a connection active moments ago is requeued without
        // the keep-alive probe.
        let fast_window = FAST_RETURN_WINDOW.min(inner.settings.host_monitoring_interval);
        if lease.last_action().elapsed() < fast_window {
            inner.requeue(&slot, client, &lease);
            return;
        }

        let mut client = client;
        if inner.factory.keep_alive(&mut client).await {
            inner.requeue(&slot, client, &lease);
            return;
        }

        debug!(host = %lease.host(), id = %lease.id(), "keep-alive failed on return, replacing");
        let _ = inner.factory.disconnect(client).await;
        if let Some(host) = inner.distributor.list().get(lease.host()) {
            match inner.factory.connect(&host).await {
                Ok(fresh) => inner.requeue_fresh(&slot, fresh),
                Err(e) => {
                    warn!(host = %lease.host(), error = %e, "failed to replace stale connection")
                }
            }
        }
    }

    /// Point-in-time counts per host, using try-locks so a contended queue
    /// reports "not available" instead of blocking.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats_snapshot()
    }

    /// Total connections reclaimed by the leak detector.
    pub fn leaks_reclaimed(&self) -> u64 {
        self.inner.leaks_reclaimed.load(Ordering::Relaxed)
    }

    /// Stop the background loops and close every pooled connection.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.shutdown.shutdown();

        let _guard = inner.lock.write().await;
        let slots: Vec<Arc<HostSlot<F::Client>>> =
            inner.slots.iter().map(|e| Arc::clone(e.value())).collect();
        let mut closed = 0usize;
        for slot in slots {
            let drained: Vec<IdleClient<F::Client>> = slot.idle.lock().drain(..).collect();
            slot.in_use.lock().clear();
            for idle in drained {
                let _ = inner.factory.disconnect(idle.client).await;
                closed += 1;
            }
        }
        info!(closed, "connection pool shut down");
    }
}

impl<F: ClientFactory> PoolInner<F> {
    fn slot(&self, host_name: &str) -> Arc<HostSlot<F::Client>> {
        Arc::clone(
            self.slots
                .entry(host_name.to_string())
                .or_insert_with(|| Arc::new(HostSlot::new()))
                .value(),
        )
    }

    /// Pop an idle connection and move it to the in-use queue.
    fn try_take_idle(
        &self,
        slot: &HostSlot<F::Client>,
        host_name: &str,
    ) -> Option<PooledClient<F::Client>> {
        let idle = slot.idle.lock().pop_front()?;
        let lease = Arc::new(Lease::new(
            idle.id,
            host_name,
            idle.connected_at,
            idle.handed_out_count + 1,
        ));
        slot.in_use.lock().push(Arc::clone(&lease));
        debug!(
            host = %host_name,
            id = %lease.id(),
            count = lease.handed_out_count(),
            "handed out pooled connection"
        );
        Some(PooledClient {
            client: idle.client,
            lease,
        })
    }

    /// Requeue a returned connection, preserving its identity.
    fn requeue(&self, slot: &HostSlot<F::Client>, client: F::Client, lease: &Lease) {
        slot.idle.lock().push_back(IdleClient {
            client,
            id: lease.id(),
            connected_at: lease.connected_at(),
            handed_out_count: lease.handed_out_count(),
            last_action: Instant::now(),
        });
        slot.returned.notify_one();
    }

    /// Queue a newly opened connection as idle.
    fn requeue_fresh(&self, slot: &HostSlot<F::Client>, client: F::Client) {
        slot.idle.lock().push_back(IdleClient::fresh(client));
        slot.returned.notify_one();
    }

    fn note_unavailable(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.borrow_unavailable();
        }
    }

    /// Grow the host toward the floor, bounded by the ceiling. A miss on
    /// the coarse lock defers the grow to the next sweep.
    async fn increase_size(&self, host: &Arc<Host>) {
        let Ok(_guard) = timeout(self.settings.lock_timeout, self.lock.write()).await else {
            debug!(host = %host.name, "pool lock busy, deferring grow");
            return;
        };
        let slot = self.slot(&host.name);
        while slot.total() < self.settings.min_pool_size
            && slot.total() < self.settings.max_pool_size
        {
            match self.factory.connect(host).await {
                Ok(client) => {
                    self.requeue_fresh(&slot, client);
                    debug!(host = %host.name, total = slot.total(), "grew pool");
                }
                Err(e) => {
                    warn!(host = %host.name, error = %e, "failed to grow pool");
                    break;
                }
            }
        }
    }

    /// Close surplus idle connections above the idle target.
    async fn reduce_size(&self, host: &Arc<Host>) {
        let Ok(_guard) = timeout(self.settings.lock_timeout, self.lock.write()).await else {
            debug!(host = %host.name, "pool lock busy, deferring shrink");
            return;
        };
        let slot = self.slot(&host.name);
        while slot.idle_len() > self.settings.idle_pool_size {
            let Some(idle) = slot.idle.lock().pop_front() else {
                break;
            };
            let _ = self.factory.disconnect(idle.client).await;
            debug!(host = %host.name, id = %idle.id, "closed surplus idle connection");
        }
    }

    /// Close every idle connection and drop every lease for a host that
    /// left the active state.
    async fn drain_host(&self, name: &str) {
        let _guard = self.lock.write().await;
        let Some(slot) = self.slots.get(name).map(|e| Arc::clone(e.value())) else {
            return;
        };
        let drained: Vec<IdleClient<F::Client>> = slot.idle.lock().drain(..).collect();
        let leases_dropped = {
            let mut in_use = slot.in_use.lock();
            let n = in_use.len();
            in_use.clear();
            n
        };
        let closed = drained.len();
        for idle in drained {
            let _ = self.factory.disconnect(idle.client).await;
        }
        info!(
            host = %name,
            closed,
            leases_dropped,
            "drained connections for unhealthy host"
        );
    }

    /// One keep-alive/leak/resize pass over every host.
    async fn sweep(&self) {
        for host in self.distributor.list().full() {
            let slot = self.slot(&host.name);

            // Leak pass: leases quiet past the threshold are reclaimed
            // under the coarse lock.
            match timeout(self.settings.lock_timeout, self.lock.write()).await {
                Ok(_guard) => {
                    let threshold = self.settings.max_borrow_interval;
                    let mut reclaimed = 0u64;
                    {
                        let mut in_use = slot.in_use.lock();
                        in_use.retain(|lease| {
                            if lease.last_action().elapsed() > threshold {
                                warn!(
                                    host = %host.name,
                                    id = %lease.id(),
                                    held_for = ?lease.taken_at().elapsed(),
                                    "reclaiming leaked connection"
                                );
                                reclaimed += 1;
                                false
                            } else {
                                true
                            }
                        });
                    }
                    if reclaimed > 0 {
                        self.leaks_reclaimed.fetch_add(reclaimed, Ordering::Relaxed);
                        warn!(host = %host.name, count = reclaimed, "leak detector reclaimed connections");
                        if let Some(metrics) = &self.metrics {
                            metrics.leaks_reclaimed(&host.name, reclaimed);
                        }
                    }
                }
                Err(_) => {
                    debug!(host = %host.name, "pool lock busy, skipping sweep pass for host");
                    continue;
                }
            }

            if host.status() == HostStatus::Active {
                // Keep-alive pass over connections idle past the monitoring
                // interval; failures are discarded and the resize below
                // restores the floor.
                let stale_after = self.settings.host_monitoring_interval;
                let mut stale = Vec::new();
                {
                    let mut idle = slot.idle.lock();
                    let mut keep = VecDeque::with_capacity(idle.len());
                    while let Some(entry) = idle.pop_front() {
                        if entry.last_action.elapsed() > stale_after {
                            stale.push(entry);
                        } else {
                            keep.push_back(entry);
                        }
                    }
                    *idle = keep;
                }
                for mut entry in stale {
                    if self.factory.keep_alive(&mut entry.client).await {
                        entry.last_action = Instant::now();
                        slot.idle.lock().push_back(entry);
                    } else {
                        debug!(host = %host.name, id = %entry.id, "idle connection failed keep-alive, discarding");
                        let _ = self.factory.disconnect(entry.client).await;
                    }
                }

                self.increase_size(&host).await;
                self.reduce_size(&host).await;
            }

            if let Some(metrics) = &self.metrics {
                metrics.set_pool_size(&host.name, slot.idle_len() as i64, slot.in_use_len() as i64);
            }
        }
    }

    fn stats_snapshot(&self) -> PoolStats {
        let hosts = self
            .distributor
            .list()
            .full()
            .iter()
            .map(|host| {
                let slot = self.slot(&host.name);
                let idle = slot.idle.try_lock().map(|queue| queue.len());
                let in_use = slot.in_use.try_lock().map(|leases| leases.len());
                HostPoolStats {
                    host: host.name.clone(),
                    status: host.status(),
                    idle,
                    in_use,
                }
            })
            .collect();
        PoolStats { hosts }
    }
}

fn display_count(count: Option<usize>) -> String {
    count.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}
