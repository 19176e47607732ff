use cds_extractor::cli::commands::{CliArgs, Commands};
use cds_extractor::cli::handlers::{handle_autobuild, handle_debug_compiler, handle_debug_parser};
use cds_extractor::util::{init_logging, parse_level_or_warn, LoggingConfig};
use cds_extractor::VERSION;

use clap::Parser;
use tracing::{debug, Level};

fn main() {
    let args = CliArgs::parse();
    init_logging(&logging_config(&args));

    debug!("cds-extractor v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Autobuild(autobuild_args) => handle_autobuild(autobuild_args),
        Commands::DebugParser(parser_args) => handle_debug_parser(parser_args),
        Commands::DebugCompiler(compiler_args) => handle_debug_compiler(compiler_args),
    };

    std::process::exit(exit_code);
}

/// Command-line flags override the environment.
fn logging_config(args: &CliArgs) -> LoggingConfig {
    let mut config = LoggingConfig::from_env();
    if let Some(level) = &args.log_level {
        config.level = parse_level_or_warn(level);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }
    config
}
