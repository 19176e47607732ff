//! Structured logging for cds-extractor
//!
//! Everything is written to stderr; stdout is reserved for reports and graph dumps so
//! that `debug-parser` output can be piped. `RUST_LOG` wins over the configured level
//! when set.
//!
//! ```no_run
//! use cds_extractor::util::logging::{init_logging, LoggingConfig};
//!
//! init_logging(&LoggingConfig::from_env());
//! tracing::info!(source_root = "/src", "Starting extraction");
//! ```

use std::env;
use std::io;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_LEVEL_ENV: &str = "CDS_EXTRACTOR_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "CDS_EXTRACTOR_LOG_JSON";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    /// One JSON object per line instead of the human formatter
    pub json: bool,
    /// Attach `file:line` to every event
    pub with_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            with_location: false,
        }
    }
}

impl LoggingConfig {
    /// Reads `CDS_EXTRACTOR_LOG_LEVEL` and `CDS_EXTRACTOR_LOG_JSON`. JSON mode turns on
    /// source locations as well.
    pub fn from_env() -> Self {
        let level = env::var(LOG_LEVEL_ENV)
            .ok()
            .map(|value| parse_level_or_warn(&value))
            .unwrap_or(Level::INFO);
        let json = env::var(LOG_JSON_ENV)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            level,
            json,
            with_location: json,
        }
    }

    fn directive(&self) -> String {
        format!("cds_extractor={}", self.level.to_string().to_ascii_lowercase())
    }
}

/// Case-insensitive level name (`trace` .. `error`).
///
/// ```
/// use cds_extractor::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("Warn"), Some(Level::WARN));
/// assert_eq!(parse_level("loud"), None);
/// ```
pub fn parse_level(value: &str) -> Option<Level> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Like [`parse_level`], falling back to INFO with a note on stderr. Logging is not up
/// yet when this runs.
pub fn parse_level_or_warn(value: &str) -> Level {
    parse_level(value).unwrap_or_else(|| {
        eprintln!(
            "Unknown log level '{}', using info (expected trace, debug, info, warn or error)",
            value
        );
        Level::INFO
    })
}

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging(config: &LoggingConfig) {
    let filter = match env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => EnvFilter::new(directives),
        _ => EnvFilter::new(config.directive()),
    };

    let base = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(config.with_location)
        .with_line_number(config.with_location);
    let output = if config.json {
        base.json().boxed()
    } else {
        base.boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init();
}

/// `850ms`, `12.34s`, `3m 4.50s`
pub fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms < 1000 {
        return format!("{}ms", ms);
    }
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        return format!("{:.2}s", secs);
    }
    let minutes = (secs / 60.0).floor();
    format!("{}m {:.2}s", minutes as u64, secs - minutes * 60.0)
}

pub fn log_extractor_start(session_id: &str, source_root: &str) {
    info!(
        session = session_id,
        source_root,
        version = crate::VERSION,
        "=== CDS EXTRACTOR START ==="
    );
}

pub fn log_extractor_stop(session_id: &str, success: bool, message: &str, elapsed: Duration) {
    let total = format_duration(elapsed);
    if success {
        info!(session = session_id, total = %total, "=== CDS EXTRACTOR STOP: {} ===", message);
    } else {
        error!(session = session_id, total = %total, "=== CDS EXTRACTOR STOP: {} ===", message);
    }
}
