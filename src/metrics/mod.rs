//! Pool and host-health metrics.

mod collector;

pub use collector::{HealthMetricsListener, MetricsCollector};
