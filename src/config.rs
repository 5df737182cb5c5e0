//! Configuration for the demonstration run.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.demandflow/config.toml` (user)
//! 3. `/etc/demandflow/config.toml` (system)
//! 4. built-in defaults
//!
//! ```toml
//! [source]
//! start = 1
//! count = 10
//! fail_after = 3
//!
//! [consumer]
//! batch_size = 2
//!
//! [logging]
//! filter = "demandflow=debug"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::publisher::{Publisher, checked_range};
use crate::{FlowError, Result};

/// Demonstration configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The integer range published by the demonstration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// First value (default: 1).
    #[serde(default = "default_start")]
    pub start: i64,
    /// Number of values (default: 10).
    #[serde(default = "default_count")]
    pub count: u64,
    /// Inject a source error after this many values.
    #[serde(default)]
    pub fail_after: Option<u64>,
    /// Message carried by the injected error.
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            count: default_count(),
            fail_after: None,
            error_message: default_error_message(),
        }
    }
}

fn default_start() -> i64 {
    1
}

fn default_count() -> u64 {
    10
}

fn default_error_message() -> String {
    "source stopped".to_string()
}

impl SourceConfig {
    /// Build the publisher this section describes.
    ///
    /// With `fail_after = n` and `n < count`, the first `n` values are
    /// followed by a [`FlowError::Source`]. Fails with
    /// [`FlowError::Configuration`] if the range overflows `i64`.
    pub fn publisher(&self) -> Result<Publisher<i64>> {
        match self.fail_after {
            Some(n) if n < self.count => {
                let error = FlowError::Source(self.error_message.clone());
                let values = checked_range(self.start, n)?.map(Ok);
                Ok(Publisher::from_results(
                    values.chain(std::iter::once(Err(error))),
                ))
            }
            _ => Publisher::range(self.start, self.count),
        }
    }
}

/// Bounded consumer settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Items requested per window (default: 2).
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> u64 {
    2
}

/// Log output settings. `RUST_LOG` takes precedence when set.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive (default: "info").
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.demandflow/config.toml`
    /// 3. `/etc/demandflow/config.toml`
    /// 4. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FlowError::Configuration(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FlowError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            FlowError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path, or `None` to fall back to defaults.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(FlowError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".demandflow").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/demandflow/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Reject settings the demand protocol cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.consumer.batch_size == 0 {
            return Err(FlowError::Configuration(
                "consumer.batch_size must be positive".to_string(),
            ));
        }
        checked_range(self.source.start, self.source.count)?;
        Ok(())
    }
}
