pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{AutobuildArgs, CliArgs, Commands, DebugCompilerArgs, DebugParserArgs};
pub use output::{OutputFormat, OutputFormatter};
