use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CodeQL extractor for SAP CAP CDS projects
#[derive(Parser, Debug)]
#[command(
    name = "cds-extractor",
    about = "CodeQL extractor for SAP CAP CDS projects",
    version,
    author,
    long_about = "cds-extractor discovers CAP projects under a source root, installs the CDS \
                  toolchain each project asks for, compiles CDS models to .cds.json and hands \
                  the results to the CodeQL JavaScript extractor."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Increase verbosity"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the full extraction for a CodeQL database",
        long_about = "Builds the project dependency graph, installs CDS dependencies, compiles \
                      every project and runs the JavaScript extractor over the output.\n\n\
                      Examples:\n  \
                      cds-extractor autobuild /path/to/source"
    )]
    Autobuild(AutobuildArgs),

    #[command(
        about = "Print the project dependency graph",
        long_about = "Detects CDS projects and prints the dependency graph without compiling.\n\n\
                      Examples:\n  \
                      cds-extractor debug-parser .\n  \
                      cds-extractor debug-parser . --format json --output graph.json"
    )]
    DebugParser(DebugParserArgs),

    #[command(
        about = "Compile without extracting and print a debug status report",
        long_about = "Builds the graph, installs dependencies unless skipped and compiles every \
                      project. No diagnostics are recorded and the JavaScript extractor is not run.\n\n\
                      Examples:\n  \
                      cds-extractor debug-compiler .\n  \
                      cds-extractor debug-compiler . --skip-install"
    )]
    DebugCompiler(DebugCompilerArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AutobuildArgs {
    #[arg(value_name = "SOURCE_ROOT", help = "Source root to extract")]
    pub source_root: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct DebugParserArgs {
    #[arg(value_name = "SOURCE_ROOT", help = "Source root to scan")]
    pub source_root: PathBuf,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct DebugCompilerArgs {
    #[arg(value_name = "SOURCE_ROOT", help = "Source root to compile")]
    pub source_root: PathBuf,

    #[arg(long, help = "Compile with globally available tooling only")]
    pub skip_install: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
