//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;

/// Validate the configuration.
///
/// Checks for:
/// - At least one host, with unique non-empty names and valid addresses
/// - Consistent pool sizing (min ≤ max, idle ≤ max, max > 0)
/// - Consistent socket probe exchange settings
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.hosts.is_empty() {
        errors.push("at least one host must be defined".to_string());
    }

    let mut names = HashSet::new();
    for host in &config.hosts {
        if host.name.is_empty() {
            errors.push("host name cannot be empty".to_string());
        }
        if !names.insert(host.name.as_str()) {
            errors.push(format!("duplicate host name: {}", host.name));
        }
        if host.host.is_empty() {
            errors.push(format!("host '{}' has an empty address", host.name));
        }
        if host.port == 0 {
            errors.push(format!("host '{}' has port 0", host.name));
        }
    }

    let pool = &config.pool;
    if pool.max_pool_size == 0 {
        errors.push("max_pool_size must be at least 1".to_string());
    }
    if pool.min_pool_size > pool.max_pool_size {
        errors.push(format!(
            "min_pool_size ({}) exceeds max_pool_size ({})",
            pool.min_pool_size, pool.max_pool_size
        ));
    }
    if pool.idle_pool_size > pool.max_pool_size {
        errors.push(format!(
            "idle_pool_size ({}) exceeds max_pool_size ({})",
            pool.idle_pool_size, pool.max_pool_size
        ));
    }
    if pool.lock_timeout.is_zero() {
        errors.push("lock_timeout must be positive".to_string());
    }

    if config.probe.request.is_some() != config.probe.expect.is_some() {
        errors.push("probe request and expect must be configured together".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use std::time::Duration;

    fn base_config() -> Config {
        serde_yaml::from_str(
            r#"
hosts:
  - name: web-1
    host: 127.0.0.1
    port: 8001
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_no_hosts() {
        let mut config = base_config();
        config.hosts.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_host_names() {
        let mut config = base_config();
        config.hosts.push(HostConfig {
            name: "web-1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8002,
            expected_text: None,
            expected_status: None,
            timeout: Duration::from_secs(5),
        });

        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("duplicate host name"));
    }

    #[test]
    fn test_min_exceeds_max() {
        let mut config = base_config();
        config.pool.min_pool_size = 10;
        config.pool.max_pool_size = 2;

        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("min_pool_size"));
    }

    #[test]
    fn test_probe_exchange_must_be_paired() {
        let mut config = base_config();
        config.probe.request = Some("PING\r\n".to_string());
        config.probe.expect = None;

        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("request and expect"));
    }

    #[test]
    fn test_port_zero() {
        let mut config = base_config();
        config.hosts[0].port = 0;
        assert!(validate_config(&config).is_err());
    }
}
