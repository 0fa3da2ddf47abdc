//! Health check scheduler.
//!
//! One background loop sweeps all registered tasks. A task is swept when it
//! is due; within a sweep only hosts that are themselves due (or forced)
//! are probed, so the task cadence can be tighter than the per-host one.

use crate::hosts::{Host, HostList, HostStatus};
use crate::monitor::{MonitoringTask, StatusListener};
use crate::probe::HealthProbe;
use crate::util::ShutdownSignal;
use parking_lot::RwLock;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Which hosts of a task to sweep.
enum Force<'a> {
    /// Only hosts that are due.
    None,
    /// Every host, regardless of due time.
    All,
    /// One named host, regardless of due time.
    Host(&'a str),
}

/// Periodic health check driver.
///
/// Explicitly constructed and started; one scheduler instance can serve any
/// number of connection pools sharing its tick loop.
pub struct HealthScheduler {
    tasks: RwLock<Vec<Arc<MonitoringTask>>>,
    shutdown: ShutdownSignal,
    tick: Duration,
}

impl HealthScheduler {
    /// Scheduler with the default 1s driver tick.
    pub fn new() -> Self {
        Self::with_tick(Duration::from_secs(1))
    }

    /// Scheduler with a custom driver tick.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            shutdown: ShutdownSignal::new(),
            tick,
        }
    }

    /// Register a host list for monitoring.
    pub fn register(
        &self,
        list: Arc<HostList>,
        probe: Arc<dyn HealthProbe>,
        interval: Duration,
    ) -> Arc<MonitoringTask> {
        let task = Arc::new(MonitoringTask::new(list, probe, interval));
        self.tasks.write().push(Arc::clone(&task));
        info!(
            list = %task.list().name(),
            hosts = task.list().len(),
            interval = ?task.interval(),
            "registered monitoring task"
        );
        task
    }

    /// Registered tasks.
    pub fn tasks(&self) -> Vec<Arc<MonitoringTask>> {
        self.tasks.read().clone()
    }

    /// Spawn the driver loop.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            info!(tick = ?self.tick, "health scheduler starting");
            let mut tick = interval(self.tick);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = tick.tick() => self.sweep_due().await,
                    _ = shutdown.recv() => {
                        info!("health scheduler shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the driver loop.
    pub fn stop(&self) {
        self.shutdown.shutdown();
    }

    /// Sweep every due task once.
    async fn sweep_due(&self) {
        let now = Instant::now();
        for task in self.tasks() {
            if task.is_due(now) {
                Self::sweep_task(&task, Force::None).await;
            }
        }
    }

    /// Check every host of a task now, ignoring due times. Used at pool
    /// start-up and by explicit admin actions.
    pub async fn force_check(&self, task: &MonitoringTask) {
        Self::sweep_task(task, Force::All).await;
    }

    /// Check one named host now in every task monitoring it.
    pub async fn force_check_host(&self, host_name: &str) {
        for task in self.tasks() {
            if task.list().get(host_name).is_some() {
                Self::sweep_task(&task, Force::Host(host_name)).await;
            }
        }
    }

    async fn sweep_task(task: &MonitoringTask, force: Force<'_>) {
        let start = Instant::now();
        let hosts = task.list().full();
        let mut transitions: Vec<(Arc<Host>, HostStatus, HostStatus)> = Vec::new();

        for host in &hosts {
            let due = match force {
                Force::None => host.is_due(start),
                Force::All => true,
                Force::Host(name) => host.name == name,
            };
            if !due {
                continue;
            }

            let old = host.status();
            if old.is_operator_set() {
                debug!(host = %host.name, status = %old, "operator-set status, not probing");
                continue;
            }

            let mut status = task.probe().probe(host).await;
            if status != HostStatus::Active {
                // Tolerate one transient failure before downgrading.
                debug!(host = %host.name, status = %status, "probe failed, retrying once");
                status = task.probe().probe(host).await;
            }

            let next = host
                .last_checked()
                .unwrap_or(start)
                .checked_add(task.interval());
            host.set_next_check(next);

            if status != old {
                host.set_status(status);
                transitions.push((Arc::clone(host), old, status));
            }
        }

        // Publish the new active subset in one atomic swap: probed hosts
        // with their fresh status, skipped hosts with their last known one.
        task.list().republish_active();

        for (host, old, new) in &transitions {
            info!(host = %host.name, old = %old, new = %new, "host status changed");
            for listener in task.listeners() {
                let call = catch_unwind(AssertUnwindSafe(|| {
                    listener.on_transition(host, *old, *new);
                }));
                if call.is_err() {
                    warn!(host = %host.name, "status listener panicked, continuing sweep");
                }
            }
        }

        // Re-evaluate the task sooner than any individual host becomes due
        // so the active list converges quickly after a transition.
        if !matches!(force, Force::Host(_)) {
            task.set_next_due(start + task.interval() / 2);
        }
    }
}

impl Default for HealthScheduler {
    fn default() -> Self {
        Self::new()
    }
}
