//! Service configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_RETRIES, DEFAULT_MAX_SEQUENCE_GAP,
    DEFAULT_RETENTION_HOURS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_SERVER_ADDR,
    DEFAULT_SNAPSHOT_INTERVAL_SECS,
};

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "LAUNCH_TELEMETRY_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "launch_config.toml";

// ============================================================================
// Top-level Config
// ============================================================================

/// Complete service configuration.
///
/// Every section is optional in the TOML; missing keys take the built-in
/// defaults from [`super::defaults`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub ingestion: IngestionConfig,
    pub aggregator: AggregatorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP bind address
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Main buffer capacity (packets)
    pub buffer_capacity: usize,
    /// Largest accepted sequence-number jump
    pub max_sequence_gap: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff delay in milliseconds
    pub retry_base_delay_ms: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_sequence_gap: DEFAULT_MAX_SEQUENCE_GAP,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl IngestionConfig {
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Snapshot retention window (hours)
    pub retention_hours: u64,
    /// Background snapshot interval (seconds)
    pub snapshot_interval_secs: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_RETENTION_HOURS,
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl ServiceConfig {
    /// Load configuration.
    ///
    /// 1. `LAUNCH_TELEMETRY_CONFIG` (path to a TOML file)
    /// 2. `./launch_config.toml`
    /// 3. Built-in defaults
    ///
    /// A file that fails to load is logged and skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded service config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded service config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Parse and validate a TOML config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check every value, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr: '{}' is not a valid socket address",
                self.server.addr
            ));
        }
        if self.ingestion.buffer_capacity == 0 {
            errors.push("ingestion.buffer_capacity: must be at least 1".to_string());
        }
        if self.ingestion.max_sequence_gap == 0 {
            errors.push("ingestion.max_sequence_gap: must be at least 1".to_string());
        }
        // 2^max_retries multiplies the base delay
        if self.ingestion.max_retries > 16 {
            errors.push(format!(
                "ingestion.max_retries: {} exceeds the limit of 16",
                self.ingestion.max_retries
            ));
        }
        if self.aggregator.retention_hours == 0 {
            errors.push("aggregator.retention_hours: must be at least 1".to_string());
        }
        if self.aggregator.snapshot_interval_secs == 0 {
            errors.push("aggregator.snapshot_interval_secs: must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}
