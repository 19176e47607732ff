//! Utility modules for cds-extractor
//!
//! - Structured logging setup and configuration
//! - Blocking subprocess helpers with optional timeouts

pub mod logging;
pub mod process;

pub use logging::{
    format_duration, init_logging, log_extractor_start, log_extractor_stop, parse_level,
    parse_level_or_warn, LoggingConfig,
};
pub use process::{
    run_captured, run_with_timeout, shell_command, shell_quote, CommandOutput, TimedOutput,
};
