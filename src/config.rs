//! Configuration management for cds-extractor
//!
//! Settings are loaded from environment variables with sensible defaults. The CodeQL
//! host variables (`CODEQL_DIST`, `CODEQL_EXTRACTOR_CDS_*`) are read by
//! [`crate::environment`] instead, since they describe the host rather than the tool.
//!
//! # Environment Variables
//!
//! - `CDS_EXTRACTOR_LOG_LEVEL`: Logging level - default: "info"
//! - `CDS_EXTRACTOR_LOG_JSON`: JSON log output (true|false) - default: "false"
//! - `CDS_EXTRACTOR_CACHE_DIR_NAME`: Name of the dependency cache directory created
//!   under the source root - default: ".cds-extractor-cache"
//! - `CDS_EXTRACTOR_PROBE_TIMEOUT`: Seconds allowed for a `cds --version` probe - default: "5"
//! - `CDS_EXTRACTOR_REGISTRY_TIMEOUT`: Seconds allowed for an `npm view` lookup - default: "30"
//! - `CDS_EXTRACTOR_SKIP_INSTALL`: Skip dependency installation (true|false) - default: "false"
//!
//! # Example
//!
//! ```no_run
//! use cds_extractor::ExtractorConfig;
//!
//! let config = ExtractorConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_CACHE_DIR_NAME: &str = ".cds-extractor-cache";
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_REGISTRY_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Runtime configuration for one extractor run
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit JSON log lines
    pub log_json: bool,

    /// Directory name (relative to the source root) holding per-version installs
    pub cache_dir_name: String,

    /// Bound for compiler `--version` probes, in seconds
    pub probe_timeout_secs: u64,

    /// Bound for published-version lookups, in seconds
    pub registry_timeout_secs: u64,

    /// Skip `npm install` into the cache; compilation then relies on global tooling
    pub skip_install: bool,
}

impl Default for ExtractorConfig {
    /// Loads from `CDS_EXTRACTOR_*` environment variables, falling back to defaults
    fn default() -> Self {
        let log_level = env::var("CDS_EXTRACTOR_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        let log_json = env::var("CDS_EXTRACTOR_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        let cache_dir_name = env::var("CDS_EXTRACTOR_CACHE_DIR_NAME")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CACHE_DIR_NAME.to_string());

        let probe_timeout_secs = env::var("CDS_EXTRACTOR_PROBE_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);

        let registry_timeout_secs = env::var("CDS_EXTRACTOR_REGISTRY_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REGISTRY_TIMEOUT_SECS);

        let skip_install = env::var("CDS_EXTRACTOR_SKIP_INSTALL")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            log_level,
            log_json,
            cache_dir_name,
            probe_timeout_secs,
            registry_timeout_secs,
            skip_install,
        }
    }
}

impl ExtractorConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` when a timeout is out of range, the log
    /// level is unknown, or the cache directory name is not a single path component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe_timeout_secs == 0 || self.probe_timeout_secs > 60 {
            return Err(ConfigError::ValidationFailed(
                "Probe timeout must be between 1 and 60 seconds".to_string(),
            ));
        }

        if self.registry_timeout_secs == 0 || self.registry_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Registry timeout must be between 1 second and 10 minutes".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if self.cache_dir_name.contains('/')
            || self.cache_dir_name.contains('\\')
            || self.cache_dir_name == "."
            || self.cache_dir_name == ".."
        {
            return Err(ConfigError::ValidationFailed(format!(
                "Cache directory name must be a single path component: {}",
                self.cache_dir_name
            )));
        }

        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    /// Flattened view used by `--format json|yaml` config output
    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("log_level".to_string(), self.log_level.clone());
        map.insert("log_json".to_string(), self.log_json.to_string());
        map.insert("cache_dir_name".to_string(), self.cache_dir_name.clone());
        map.insert(
            "probe_timeout_secs".to_string(),
            self.probe_timeout_secs.to_string(),
        );
        map.insert(
            "registry_timeout_secs".to_string(),
            self.registry_timeout_secs.to_string(),
        );
        map.insert("skip_install".to_string(), self.skip_install.to_string());
        map
    }
}

impl fmt::Display for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cds-extractor Configuration:")?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  JSON Logs: {}", self.log_json)?;
        writeln!(f, "  Cache Directory: {}", self.cache_dir_name)?;
        writeln!(f, "  Probe Timeout: {}s", self.probe_timeout_secs)?;
        writeln!(f, "  Registry Timeout: {}s", self.registry_timeout_secs)?;
        write!(f, "  Skip Install: {}", self.skip_install)
    }
}
