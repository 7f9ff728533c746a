use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub mod telemetry;

/// Prefix for environment overrides, e.g. `PRIME_POOL__POOL__MIN_SIZE=4`.
const ENV_PREFIX: &str = "PRIME_POOL";

/// Looked up when no `--config-file` is given; missing is fine and yields
/// the built-in defaults.
const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Pool engine configuration. Immutable after construction.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
#[validate(schema(function = validate_pool_config))]
pub struct PoolConfig {
    /// Refill target: rounds generate until this many sets are warm.
    #[validate(range(min = 1))]
    pub min_size: usize,
    /// Hard ceiling on pool depth.
    #[validate(range(min = 1))]
    pub max_size: usize,
    /// Depth at or below which a refill round is triggered.
    #[validate(range(min = 1))]
    pub refill_threshold: usize,
    /// Bit size of each safe prime underlying `n_tilde`.
    #[validate(range(min = 16))]
    pub prime_bits: u64,
    /// Bit size of the Paillier modulus.
    #[validate(range(min = 16))]
    pub paillier_bits: u64,
    /// Ceiling on parallel generator invocations within a refill round.
    #[validate(range(min = 1))]
    pub max_concurrent: usize,
    pub pool_dir: PathBuf,
    pub auto_save: bool,
    pub background_enabled: bool,
    pub refill_interval_secs: u64,
    /// Refill rounds are suppressed for this long after startup. 0 in
    /// production; tests raise it to assert the suppression.
    pub warmup_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 20,
            refill_threshold: 5,
            prime_bits: 1024,
            paillier_bits: 2048,
            max_concurrent: 2,
            pool_dir: PathBuf::from("./prime_pool"),
            auto_save: true,
            background_enabled: true,
            refill_interval_secs: 30,
            warmup_secs: 0,
        }
    }
}

impl PoolConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_secs(self.refill_interval_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}

fn validate_pool_config(config: &PoolConfig) -> Result<(), ValidationError> {
    if config.refill_threshold > config.min_size {
        return Err(ValidationError::new("refill_threshold").with_message(
            format!(
                "refill_threshold ({}) must not exceed min_size ({})",
                config.refill_threshold, config.min_size
            )
            .into(),
        ));
    }
    if config.min_size > config.max_size {
        return Err(ValidationError::new("min_size").with_message(
            format!(
                "min_size ({}) must not exceed max_size ({})",
                config.min_size, config.max_size
            )
            .into(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConf {
    pub service_name: String,
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` wins when set.
    pub filter: String,
}

impl Default for TracingConf {
    fn default() -> Self {
        Self {
            service_name: "prime_pool".to_string(),
            filter: "info".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    #[validate(length(min = 1))]
    pub listen_address: String,
    #[validate(nested)]
    pub pool: PoolConfig,
    pub tracing: TracingConf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:50055".to_string(),
            pool: PoolConfig::default(),
            tracing: TracingConf::default(),
        }
    }
}

/// Initialize configuration from an optional file plus environment
/// overrides. An explicitly named file must exist; the default file may be
/// absent.
pub fn init_conf<'a, T: Deserialize<'a>>(config_file: Option<&str>) -> anyhow::Result<T> {
    let builder = match config_file {
        Some(path) => Config::builder().add_source(File::with_name(path).required(true)),
        None => Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };
    let settings = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .context("failed to build configuration")?;
    settings
        .try_deserialize()
        .context("failed to deserialize configuration")
}

/// Load and validate the full service configuration.
pub fn load_service_config(config_file: Option<&str>) -> anyhow::Result<ServiceConfig> {
    let config: ServiceConfig = init_conf(config_file)?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.listen_address, "0.0.0.0:50055");
        assert_eq!(config.pool.min_size, 10);
        assert_eq!(config.pool.max_size, 20);
        assert_eq!(config.pool.refill_threshold, 5);
        assert_eq!(config.pool.prime_bits, 1024);
        assert_eq!(config.pool.paillier_bits, 2048);
        assert_eq!(config.pool.max_concurrent, 2);
        assert_eq!(config.pool.pool_dir, PathBuf::from("./prime_pool"));
        assert!(config.pool.auto_save);
        assert!(config.pool.background_enabled);
        assert_eq!(config.pool.refill_interval(), Duration::from_secs(30));
        assert_eq!(config.pool.warmup(), Duration::ZERO);
    }

    #[test]
    fn threshold_above_min_size_is_rejected() {
        let config = PoolConfig {
            refill_threshold: 11,
            min_size: 10,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_size_above_max_size_is_rejected() {
        let config = PoolConfig {
            min_size: 30,
            max_size: 20,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_max_concurrent_is_rejected() {
        let config = PoolConfig {
            max_concurrent: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_defaults_pass_validation() {
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        std::fs::write(
            &path,
            r#"
listen_address = "127.0.0.1:6000"

[pool]
min_size = 3
max_size = 6
refill_threshold = 2
"#,
        )
        .unwrap();

        let config = load_service_config(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:6000");
        assert_eq!(config.pool.min_size, 3);
        assert_eq!(config.pool.max_size, 6);
        // Untouched fields keep their defaults.
        assert_eq!(config.pool.prime_bits, 1024);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load_service_config(Some("/nonexistent/prime-pool.toml")).is_err());
    }
}
