//! cds-extractor - CodeQL extractor for SAP Cloud Application Programming (CAP) models
//!
//! The extractor turns a source tree containing CDS models into `.cds.json` files the
//! CodeQL JavaScript extractor can index. A run goes through four phases:
//!
//! - **Parse**: detect CAP projects, read their `package.json` manifests, resolve
//!   `using ... from` imports and decide per project whether to compile file by file
//!   or as a whole
//! - **Install**: resolve the `@sap/cds` / `@sap/cds-dk` versions each project asks
//!   for against the npm registry and install every distinct combination once into a
//!   shared cache
//! - **Compile**: pick a working `cds` command per project and run the planned
//!   compilation tasks, recording failures as CodeQL diagnostics
//! - **Extract**: invoke the JavaScript extractor with CDS-aware index filters
//!
//! # Example Usage
//!
//! ```no_run
//! use cds_extractor::{ExtractionContext, ExtractionPipeline, ExtractorConfig, ExtractorSession};
//! use std::path::Path;
//!
//! let root = Path::new("/path/to/source");
//! let session = ExtractorSession::new(ExtractorConfig::default(), root);
//! let mut context = ExtractionContext::new(root);
//!
//! ExtractionPipeline::debug_compiler(false).execute(&session, &mut context)?;
//! println!("{} JSON files", context.graph.status_summary.json_files_generated);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod environment;
pub mod packages;
pub mod pipeline;
pub mod progress;
pub mod project;
pub mod session;
pub mod util;

pub use compiler::{CompilationOrchestrator, CompilationTask, CompileError};
pub use config::{ConfigError, ExtractorConfig};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
pub use environment::{EnvironmentError, HostEnvironment};
pub use packages::{DependencyInstaller, VersionCache, VersionResolution};
pub use pipeline::{ExtractionContext, ExtractionPipeline, ExtractorPhase};
pub use project::{DependencyGraph, DependencyGraphBuilder, ProjectRecord};
pub use session::ExtractorSession;
pub use util::{init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_cds_extractor() {
        assert_eq!(NAME, "cds-extractor");
    }
}
