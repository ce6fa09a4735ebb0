//! Service Configuration Module
//!
//! Operator-tunable ingestion, retry and retention settings loaded from
//! TOML.
//!
//! ## Loading Order
//!
//! 1. `LAUNCH_TELEMETRY_CONFIG` environment variable (path to TOML file)
//! 2. `launch_config.toml` in the current working directory
//! 3. Built-in defaults (see [`defaults`])
//!
//! ## Usage
//!
//! The loaded config is a plain value handed to the services that need it:
//!
//! ```ignore
//! let config = ServiceConfig::load();
//! let services = LaunchServices::new(&config);
//! ```

mod service_config;
pub mod defaults;

pub use service_config::*;
