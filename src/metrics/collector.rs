//! Metrics collector using prometheus-client.
//!
//! Tracks per-host pool occupancy, leak reclamations, borrow failures, and
//! host health. The embedding application scrapes via [`MetricsCollector::encode`];
//! this crate serves no HTTP endpoint itself.

use crate::hosts::{Host, HostStatus};
use crate::monitor::StatusListener;
use prometheus_client::encoding::{EncodeLabelSet, text};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tracing::warn;

/// Labels for per-host metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HostLabels {
    pub host: String,
}

/// Labels for status transition counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct TransitionLabels {
    pub host: String,
    pub status: String,
}

/// Collects and stores all metrics.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsCollectorInner>,
}

struct MetricsCollectorInner {
    /// Idle connections per host.
    idle_connections: Family<HostLabels, Gauge>,
    /// In-use connections per host.
    in_use_connections: Family<HostLabels, Gauge>,
    /// Connections reclaimed by the leak detector.
    leaks_reclaimed: Family<HostLabels, Counter>,
    /// Borrows that found no connection available.
    borrow_unavailable: Counter,
    /// Host health gauge (1 = active, 0 = not).
    host_active: Family<HostLabels, Gauge>,
    /// Status transitions by resulting status.
    status_transitions: Family<TransitionLabels, Counter>,
    /// The prometheus registry.
    registry: Registry,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let idle_connections = Family::<HostLabels, Gauge>::default();
        let in_use_connections = Family::<HostLabels, Gauge>::default();
        let leaks_reclaimed = Family::<HostLabels, Counter>::default();
        let borrow_unavailable = Counter::default();
        let host_active = Family::<HostLabels, Gauge>::default();
        let status_transitions = Family::<TransitionLabels, Counter>::default();

        registry.register(
            "hostpool_idle_connections",
            "Idle pooled connections per host",
            idle_connections.clone(),
        );
        registry.register(
            "hostpool_in_use_connections",
            "Handed-out pooled connections per host",
            in_use_connections.clone(),
        );
        registry.register(
            "hostpool_leaks_reclaimed",
            "Connections reclaimed by the leak detector",
            leaks_reclaimed.clone(),
        );
        registry.register(
            "hostpool_borrow_unavailable",
            "Borrows that found no connection available",
            borrow_unavailable.clone(),
        );
        registry.register(
            "hostpool_host_active",
            "Host health (1 = active, 0 = not)",
            host_active.clone(),
        );
        registry.register(
            "hostpool_status_transitions",
            "Host status transitions by resulting status",
            status_transitions.clone(),
        );

        Self {
            inner: Arc::new(MetricsCollectorInner {
                idle_connections,
                in_use_connections,
                leaks_reclaimed,
                borrow_unavailable,
                host_active,
                status_transitions,
                registry,
            }),
        }
    }

    /// Record current pool occupancy for a host.
    pub fn set_pool_size(&self, host: &str, idle: i64, in_use: i64) {
        let labels = HostLabels {
            host: host.to_string(),
        };
        self.inner.idle_connections.get_or_create(&labels).set(idle);
        self.inner
            .in_use_connections
            .get_or_create(&labels)
            .set(in_use);
    }

    /// Count leak reclamations for a host.
    pub fn leaks_reclaimed(&self, host: &str, count: u64) {
        self.inner
            .leaks_reclaimed
            .get_or_create(&HostLabels {
                host: host.to_string(),
            })
            .inc_by(count);
    }

    /// Count a borrow that found no connection available.
    pub fn borrow_unavailable(&self) {
        self.inner.borrow_unavailable.inc();
    }

    /// Record a host status transition.
    pub fn record_transition(&self, host: &str, new: HostStatus) {
        let labels = HostLabels {
            host: host.to_string(),
        };
        self.inner
            .host_active
            .get_or_create(&labels)
            .set(i64::from(new.is_active()));
        self.inner
            .status_transitions
            .get_or_create(&TransitionLabels {
                host: host.to_string(),
                status: new.to_string(),
            })
            .inc();
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Err(e) = text::encode(&mut out, &self.inner.registry) {
            warn!(error = %e, "failed to encode metrics");
        }
        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Status listener feeding host transitions into a collector. Register it
/// on a monitoring task alongside the pool's own listener.
pub struct HealthMetricsListener {
    collector: MetricsCollector,
}

impl HealthMetricsListener {
    /// Create a listener reporting into `collector`.
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }
}

impl StatusListener for HealthMetricsListener {
    fn on_transition(&self, host: &Host, _old: HostStatus, new: HostStatus) {
        self.collector.record_transition(&host.name, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size_gauges() {
        let collector = MetricsCollector::new();
        collector.set_pool_size("web-1", 3, 1);

        let output = collector.encode();
        assert!(output.contains("hostpool_idle_connections{host=\"web-1\"} 3"));
        assert!(output.contains("hostpool_in_use_connections{host=\"web-1\"} 1"));
    }

    #[test]
    fn test_leak_and_borrow_counters() {
        let collector = MetricsCollector::new();
        collector.leaks_reclaimed("web-1", 2);
        collector.borrow_unavailable();

        let output = collector.encode();
        assert!(output.contains("hostpool_leaks_reclaimed_total{host=\"web-1\"} 2"));
        assert!(output.contains("hostpool_borrow_unavailable_total 1"));
    }

    #[test]
    fn test_transition_listener() {
        let collector = MetricsCollector::new();
        let listener = HealthMetricsListener::new(collector.clone());
        let host = Host::new("web-1", "127.0.0.1", 8001);

        listener.on_transition(&host, HostStatus::Unknown, HostStatus::Active);
        let output = collector.encode();
        assert!(output.contains("hostpool_host_active{host=\"web-1\"} 1"));

        listener.on_transition(&host, HostStatus::Active, HostStatus::Down);
        let output = collector.encode();
        assert!(output.contains("hostpool_host_active{host=\"web-1\"} 0"));
        assert!(output.contains("status=\"down\""));
    }
}
