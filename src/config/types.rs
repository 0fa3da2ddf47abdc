//! Configuration data types.

use crate::hosts::{Host, HostList};
use crate::pool::PoolSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Name of the host group.
    #[serde(default = "default_group_name")]
    pub name: String,

    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Pool sizing and cadence settings
    #[serde(default)]
    pub pool: PoolConfig,

    /// Health probe selection and parameters
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Load balancing pattern
    #[serde(default)]
    pub pattern: PatternKind,

    /// Backend hosts
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl Config {
    /// Build the host list described by this configuration.
    pub fn build_host_list(&self) -> Arc<HostList> {
        let list = HostList::new(self.name.clone());
        for host in &self.hosts {
            list.add_host(Arc::new(host.build()));
        }
        Arc::new(list)
    }
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfig {
    /// Floor for per-host idle+in-use connections while a host is active
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: usize,

    /// Idle connections above this are closed by the sweep
    #[serde(default = "default_idle_pool_size")]
    pub idle_pool_size: usize,

    /// Hard ceiling on per-host idle+in-use connections
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    /// Borrow polls briefly instead of failing immediately at capacity
    #[serde(default)]
    pub block_when_empty: bool,

    /// Health re-check cadence; also gates the return-path fast path
    #[serde(default = "default_monitoring_interval", with = "humantime_serde")]
    pub host_monitoring_interval: Duration,

    /// Borrowed connections held longer than this are reclaimed as leaks
    #[serde(default = "default_max_borrow_interval", with = "humantime_serde")]
    pub max_borrow_interval: Duration,

    /// Cadence of the keep-alive/leak/resize sweep
    #[serde(default = "default_noop_interval", with = "humantime_serde")]
    pub noop_interval: Duration,

    /// Bound on coarse-lock acquisition from hot paths
    #[serde(default = "default_lock_timeout", with = "humantime_serde")]
    pub lock_timeout: Duration,

    /// Cadence of the periodic stats log; absent disables it
    #[serde(default, with = "option_humantime_serde")]
    pub stats_interval: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_pool_size: default_min_pool_size(),
            idle_pool_size: default_idle_pool_size(),
            max_pool_size: default_max_pool_size(),
            block_when_empty: false,
            host_monitoring_interval: default_monitoring_interval(),
            max_borrow_interval: default_max_borrow_interval(),
            noop_interval: default_noop_interval(),
            lock_timeout: default_lock_timeout(),
            stats_interval: None,
        }
    }
}

impl PoolConfig {
    /// Convert to runtime pool settings.
    pub fn to_settings(&self) -> PoolSettings {
        PoolSettings {
            min_pool_size: self.min_pool_size,
            idle_pool_size: self.idle_pool_size,
            max_pool_size: self.max_pool_size,
            block_when_empty: self.block_when_empty,
            host_monitoring_interval: self.host_monitoring_interval,
            max_borrow_interval: self.max_borrow_interval,
            noop_interval: self.noop_interval,
            lock_timeout: self.lock_timeout,
            stats_interval: self.stats_interval,
        }
    }
}

/// Individual host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Unique logical name
    pub name: String,

    /// Hostname or IP address
    pub host: String,

    /// Port
    pub port: u16,

    /// Text the probe expects in a banner, response, or body
    #[serde(default)]
    pub expected_text: Option<String>,

    /// Acceptable HTTP status codes (default: 200 only)
    #[serde(default)]
    pub expected_status: Option<Vec<u16>>,

    /// Probe timeout for this host
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl HostConfig {
    /// Build the runtime host.
    pub fn build(&self) -> Host {
        let mut host =
            Host::new(self.name.clone(), self.host.clone(), self.port).with_timeout(self.timeout);
        if let Some(text) = &self.expected_text {
            host = host.with_expected_text(text.clone());
        }
        if let Some(codes) = &self.expected_status {
            host = host.with_expected_status(codes.clone());
        }
        host
    }
}

/// Health probe selection and parameters.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProbeSettings {
    /// Probe kind: ping, socket, http, or datagram
    #[serde(default, rename = "type")]
    pub kind: ProbeKind,

    /// HTTP path to check (http probe)
    #[serde(default)]
    pub path: Option<String>,

    /// Request to send after connecting (socket probe)
    #[serde(default)]
    pub request: Option<String>,

    /// Text expected in the response to `request` (socket probe)
    #[serde(default)]
    pub expect: Option<String>,

    /// Request payload (datagram probe)
    #[serde(default)]
    pub payload: Option<String>,

    /// Wrap the probe connection in TLS (socket probe)
    #[serde(default)]
    pub tls: bool,

    /// Delay before closing the probe connection (socket probe)
    #[serde(default, with = "option_humantime_serde")]
    pub close_delay: Option<Duration>,
}

/// Kind of health probe.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Ping,
    Socket,
    Http,
    Datagram,
}

/// Load balancing pattern.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    FirstActive,
    #[default]
    RoundRobin,
    Random,
    Hashed,
}

// Default value functions
fn default_group_name() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_min_pool_size() -> usize {
    1
}

fn default_idle_pool_size() -> usize {
    2
}

fn default_max_pool_size() -> usize {
    4
}

fn default_monitoring_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_borrow_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_noop_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Custom serde module for humantime durations.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

/// Custom serde module for optional humantime durations.
mod option_humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                let s = humantime::format_duration(*d).to_string();
                serializer.serialize_some(&s)
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<String> = Option::deserialize(deserializer)?;
        match opt {
            Some(s) => {
                let d = humantime::parse_duration(&s).map_err(serde::de::Error::custom)?;
                Ok(Some(d))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_defaults() {
        let pool = PoolConfig::default();
        assert_eq!(pool.min_pool_size, 1);
        assert_eq!(pool.max_pool_size, 4);
        assert!(!pool.block_when_empty);
        assert_eq!(pool.lock_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_pattern_serde() {
        let pattern: PatternKind = serde_yaml::from_str("round_robin").unwrap();
        assert_eq!(pattern, PatternKind::RoundRobin);

        let pattern: PatternKind = serde_yaml::from_str("first_active").unwrap();
        assert_eq!(pattern, PatternKind::FirstActive);
    }

    #[test]
    fn test_probe_kind_serde() {
        let kind: ProbeKind = serde_yaml::from_str("datagram").unwrap();
        assert_eq!(kind, ProbeKind::Datagram);
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = r#"
host_monitoring_interval: 30s
max_borrow_interval: 2m
"#;
        let pool: PoolConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(pool.host_monitoring_interval, Duration::from_secs(30));
        assert_eq!(pool.max_borrow_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_host_config_build() {
        let config = HostConfig {
            name: "web-1".to_string(),
            host: "10.0.0.1".to_string(),
            port: 8080,
            expected_text: Some("ok".to_string()),
            expected_status: None,
            timeout: Duration::from_secs(3),
        };

        let host = config.build();
        assert_eq!(host.name, "web-1");
        assert_eq!(host.addr(), "10.0.0.1:8080");
        assert_eq!(host.expected_text.as_deref(), Some("ok"));
        assert_eq!(host.timeout, Duration::from_secs(3));
    }
}
