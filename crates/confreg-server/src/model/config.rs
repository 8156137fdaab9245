//! Application configuration
//!
//! Values come from `conf/application.yml` (optional), then `CONFREG.*`
//! environment variables, then command line flags, each layer overriding
//! the previous one.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};

use confreg_common::{ConfregError, DEFAULT_CONSUL_ADDRESS, DEFAULT_SERVER_PORT, Result};
use confreg_persistence::{ConsulConfig, StorageMode};

use crate::middleware::rate_limit::RateLimitConfig;
use crate::startup::{LogRotation, LoggingConfig};

const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";

/// Command line arguments for the server
#[derive(Debug, Default, Parser)]
#[command(name = "confreg-server", version, about = "Versioned configuration registry")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long = "config", env = "CONFREG_CONFIG_FILE")]
    pub config_file: Option<String>,
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,
    /// Storage backend: memory or consul
    #[arg(short = 's', long = "storage")]
    pub storage: Option<String>,
    #[arg(long = "consul-address", env = "CONSUL_HTTP_ADDR")]
    pub consul_address: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct AppConfiguration {
    pub config: Config,
}

fn config_error(e: config::ConfigError) -> ConfregError {
    ConfregError::ConfigError(e.to_string())
}

impl AppConfiguration {
    /// Load configuration using the process arguments.
    pub fn new() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> Result<Self> {
        let config_file = args
            .config_file
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut config_builder = Config::builder()
            .add_source(File::with_name(&config_file).required(false))
            .add_source(
                Environment::with_prefix("confreg")
                    .separator(".")
                    .try_parsing(true),
            );

        if let Some(v) = args.port {
            config_builder = config_builder
                .set_override("server.port", i64::from(v))
                .map_err(config_error)?;
        }
        if let Some(v) = args.storage {
            config_builder = config_builder
                .set_override("storage.mode", v)
                .map_err(config_error)?;
        }
        if let Some(v) = args.consul_address {
            config_builder = config_builder
                .set_override("storage.consul.address", v)
                .map_err(config_error)?;
        }

        let app_config = AppConfiguration {
            config: config_builder.build().map_err(config_error)?,
        };
        app_config.validate()?;

        Ok(app_config)
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.storage_mode()?;
        self.rate_limit_config()?;
        if self.server_port() == 0 {
            return Err(ConfregError::ConfigError(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Server Configuration
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string("server.address")
            .unwrap_or("0.0.0.0".to_string())
    }

    pub fn server_port(&self) -> u16 {
        self.config
            .get_int("server.port")
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        let secs = self
            .config
            .get_int("server.shutdown_timeout_secs")
            .unwrap_or(120)
            .max(0) as u64;
        Duration::from_secs(secs)
    }

    // ========================================================================
    // Storage Configuration
    // ========================================================================

    pub fn storage_mode(&self) -> Result<StorageMode> {
        self.config
            .get_string("storage.mode")
            .unwrap_or(StorageMode::Memory.to_string())
            .parse()
            .map_err(ConfregError::ConfigError)
    }

    pub fn consul_address(&self) -> String {
        self.config
            .get_string("storage.consul.address")
            .unwrap_or(DEFAULT_CONSUL_ADDRESS.to_string())
    }

    pub fn consul_timeout_ms(&self) -> u64 {
        self.config
            .get_int("storage.consul.timeout_ms")
            .unwrap_or(5000)
            .max(1) as u64
    }

    pub fn consul_config(&self) -> ConsulConfig {
        ConsulConfig {
            address: self.consul_address(),
            timeout: Duration::from_millis(self.consul_timeout_ms()),
        }
    }

    // ========================================================================
    // Admission Configuration
    // ========================================================================

    pub fn admission_enabled(&self) -> bool {
        self.config.get_bool("admission.enabled").unwrap_or(true)
    }

    pub fn rate_limit_config(&self) -> Result<RateLimitConfig> {
        let max_events = self.config.get_int("admission.max_events").unwrap_or(100);
        let window_secs = self.config.get_int("admission.window_secs").unwrap_or(60);

        if max_events <= 0 || max_events > i64::from(u32::MAX) {
            return Err(ConfregError::ConfigError(format!(
                "admission.max_events must be a positive integer, got {}",
                max_events
            )));
        }
        if window_secs <= 0 {
            return Err(ConfregError::ConfigError(format!(
                "admission.window_secs must be positive, got {}",
                window_secs
            )));
        }

        Ok(RateLimitConfig {
            max_events: max_events as u32,
            window_duration: Duration::from_secs(window_secs as u64),
            enabled: self.admission_enabled(),
        })
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        let rotation = self
            .config
            .get_string("logging.rotation")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LogRotation::Daily);

        LoggingConfig::from_config(
            self.config.get_string("logging.dir").ok(),
            self.config.get_bool("logging.console").unwrap_or(true),
            self.config.get_bool("logging.file").unwrap_or(false),
            self.config
                .get_string("logging.level")
                .unwrap_or("info".to_string()),
            rotation,
        )
    }

    // ========================================================================
    // Metrics Configuration
    // ========================================================================

    pub fn metrics_enabled(&self) -> bool {
        self.config.get_bool("metrics.enabled").unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn from_yaml(yaml: &str) -> Result<AppConfiguration> {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        AppConfiguration::from_cli(Cli {
            config_file: Some(file.path().to_string_lossy().into_owned()),
            ..Default::default()
        })
    }

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfiguration::from_cli(Cli {
            config_file: Some("/nonexistent/confreg.yml".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
        assert_eq!(config.server_address(), "0.0.0.0");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(120));
        assert_eq!(config.storage_mode().unwrap(), StorageMode::Memory);
        assert_eq!(config.consul_config().timeout, Duration::from_secs(5));

        let rate_limit = config.rate_limit_config().unwrap();
        assert_eq!(rate_limit.max_events, 100);
        assert_eq!(rate_limit.window_duration, Duration::from_secs(60));
        assert!(rate_limit.enabled);
        assert!(config.metrics_enabled());
    }

    #[test]
    fn test_values_from_file() {
        let config = from_yaml(
            r#"
server:
  port: 9100
  shutdown_timeout_secs: 5
storage:
  mode: consul
  consul:
    address: http://consul:8500
admission:
  max_events: 3
  window_secs: 1
logging:
  level: debug
  rotation: hourly
"#,
        )
        .unwrap();

        assert_eq!(config.server_port(), 9100);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.storage_mode().unwrap(), StorageMode::Consul);
        assert_eq!(config.consul_address(), "http://consul:8500");
        assert_eq!(config.rate_limit_config().unwrap().max_events, 3);
        assert_eq!(config.logging_config().rotation, LogRotation::Hourly);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(b"server:\n  port: 9100\nstorage:\n  mode: memory\n")
            .unwrap();

        let config = AppConfiguration::from_cli(Cli {
            config_file: Some(file.path().to_string_lossy().into_owned()),
            port: Some(9200),
            storage: Some("consul".to_string()),
            consul_address: Some("http://10.0.0.1:8500".to_string()),
        })
        .unwrap();

        assert_eq!(config.server_port(), 9200);
        assert_eq!(config.storage_mode().unwrap(), StorageMode::Consul);
        assert_eq!(config.consul_address(), "http://10.0.0.1:8500");
    }

    #[test]
    fn test_non_positive_admission_window_rejected() {
        let err = from_yaml("admission:\n  window_secs: 0\n").unwrap_err();
        assert!(matches!(err, ConfregError::ConfigError(_)));
    }

    #[test]
    fn test_non_positive_admission_max_rejected() {
        let err = from_yaml("admission:\n  max_events: -1\n").unwrap_err();
        assert!(matches!(err, ConfregError::ConfigError(_)));
    }

    #[test]
    fn test_unknown_storage_mode_rejected() {
        let err = from_yaml("storage:\n  mode: etcd\n").unwrap_err();
        assert!(matches!(err, ConfregError::ConfigError(_)));
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["confreg-server", "-p", "8100", "--storage", "consul"])
            .unwrap();
        assert_eq!(cli.port, Some(8100));
        assert_eq!(cli.storage.as_deref(), Some("consul"));
    }
}
