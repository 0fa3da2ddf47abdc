//! Configuration loading and validation.

mod loader;
mod types;
mod validation;

pub use loader::{ConfigError, load_config};
pub use types::{
    Config, GlobalConfig, HostConfig, LogFormat, PatternKind, PoolConfig, ProbeKind, ProbeSettings,
};
pub use validation::validate_config;
