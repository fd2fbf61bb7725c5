//! Monitor configuration
//!
//! Compiled-in defaults, optionally overridden by `obd-monitor.toml` and
//! `OBD_MONITOR__*` environment variables.

use config::{Config, Environment, File, FileFormat, Map, Source};
use obd_protocol::BusConfig;
use obd_scheduler::{OutputFormat, PollConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::Level;

/// Optional override file, looked up in the working directory
pub const CONFIG_FILE: &str = "obd-monitor.toml";

/// Environment variable prefix; nested keys are joined with `__`
pub const ENV_PREFIX: &str = "OBD_MONITOR";

/// Errors while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Source could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// Values parsed but are unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Maximum level: trace, debug, info, warn or error
    pub level: String,
    /// Emit log events as JSON
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.level)))
    }
}

/// Report output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Top-level monitor configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub bus: BusConfig,
    pub poll: PollConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
}

impl MonitorConfig {
    /// Load defaults, then `obd-monitor.toml` if present, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::layered(File::with_name(CONFIG_FILE).required(false), None)
    }

    /// Layer a TOML document over the defaults
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Self::layered(File::from_str(contents, FileFormat::Toml), Some(Map::new()))
    }

    /// Build from defaults, one file source and environment variables.
    ///
    /// `env` replaces the process environment when given.
    fn layered<S>(file: S, env: Option<Map<String, String>>) -> Result<Self, ConfigError>
    where
        S: Source + Send + Sync + 'static,
    {
        let settings = Config::builder()
            .add_source(Config::try_from(&MonitorConfig::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let config: MonitorConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the poll loop or bus cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid("poll.interval_ms must be greater than 0".into()));
        }
        if self.bus.tx_queue_depth == 0 || self.bus.rx_queue_depth == 0 {
            return Err(ConfigError::Invalid("bus queue depths must be greater than 0".into()));
        }
        if self.bus.bitrate == 0 {
            return Err(ConfigError::Invalid("bus.bitrate must be greater than 0".into()));
        }
        self.logging.max_level()?;
        Ok(())
    }
}
