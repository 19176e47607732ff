//! Subcommand handlers; each returns the process exit code

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

use super::commands::{AutobuildArgs, DebugCompilerArgs, DebugParserArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::compiler::report::{generate_debug_report, generate_status_report, DebugDetails};
use crate::config::ExtractorConfig;
use crate::diagnostics::CodeqlDiagnostics;
use crate::environment::HostEnvironment;
use crate::pipeline::{ExtractionContext, ExtractionPipeline};
use crate::session::ExtractorSession;
use crate::util::{log_extractor_start, log_extractor_stop};

pub fn handle_autobuild(args: &AutobuildArgs) -> i32 {
    let start = Instant::now();
    let Some(config) = load_config() else {
        return 1;
    };
    let source_root = resolve_source_root(&args.source_root);
    let session = ExtractorSession::new(config, &source_root);
    log_extractor_start(session.id(), &source_root.display().to_string());

    let host = match HostEnvironment::discover(&source_root) {
        Ok(host) => host,
        Err(errors) => {
            for e in &errors {
                error!("{}", e);
            }
            log_extractor_stop(session.id(), false, "Environment setup failed", start.elapsed());
            return 1;
        }
    };
    info!(codeql = %host.codeql.display(), "CodeQL environment ready");

    let session = session.with_diagnostics(Box::new(CodeqlDiagnostics::from_env(&host.codeql)));
    let mut context = ExtractionContext::new(&source_root);
    let result = ExtractionPipeline::autobuild(host).execute(&session, &mut context);

    info!("Final Status Report:\n{}", generate_status_report(&context.graph));

    if let Err(e) = result {
        error!("{:#}", e);
        log_extractor_stop(session.id(), false, "CDS extraction failed", start.elapsed());
        return 1;
    }

    if context.extractor_failed() {
        log_extractor_stop(session.id(), false, "JavaScript extractor failed", start.elapsed());
        return 1;
    }

    let message = if context.graph.status_summary.overall_success {
        "CDS extraction completed successfully"
    } else {
        "CDS extraction completed with compilation failures"
    };
    log_extractor_stop(session.id(), true, message, start.elapsed());
    0
}

pub fn handle_debug_parser(args: &DebugParserArgs) -> i32 {
    let Some(config) = load_config() else {
        return 1;
    };
    let source_root = resolve_source_root(&args.source_root);
    let session = ExtractorSession::new(config, &source_root);
    let mut context = ExtractionContext::new(&source_root);

    if let Err(e) = ExtractionPipeline::debug_parser().execute(&session, &mut context) {
        error!("{:#}", e);
        return 1;
    }

    match write_graph(&context, args) {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

pub fn handle_debug_compiler(args: &DebugCompilerArgs) -> i32 {
    let start = Instant::now();
    let Some(config) = load_config() else {
        return 1;
    };
    let skip_install = args.skip_install || config.skip_install;
    let source_root = resolve_source_root(&args.source_root);
    let session = ExtractorSession::new(config, &source_root);
    log_extractor_start(session.id(), &source_root.display().to_string());

    let mut context = ExtractionContext::new(&source_root);
    let result = ExtractionPipeline::debug_compiler(skip_install).execute(&session, &mut context);

    let details = DebugDetails {
        project_commands: &context.project_commands,
        analysis: context.command_analysis.as_ref(),
        version_cache: session.versions().stats(),
    };
    println!("{}", generate_debug_report(&context.graph, &details));
    debug!(packages = ?session.versions().cached_packages(), "Version cache contents");

    if let Err(e) = result {
        error!("{:#}", e);
        log_extractor_stop(session.id(), false, "Debug compilation failed", start.elapsed());
        return 1;
    }

    let success = context.graph.status_summary.overall_success;
    log_extractor_stop(
        session.id(),
        success,
        if success {
            "Debug compilation succeeded"
        } else {
            "Debug compilation finished with failures"
        },
        start.elapsed(),
    );
    if success {
        0
    } else {
        1
    }
}

fn load_config() -> Option<ExtractorConfig> {
    let config = ExtractorConfig::default();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return None;
    }
    if let Ok(rendered) = OutputFormatter::new(OutputFormat::Human).format_config(&config) {
        debug!("{}", rendered);
    }
    Some(config)
}

fn resolve_source_root(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn write_graph(context: &ExtractionContext, args: &DebugParserArgs) -> Result<()> {
    let formatter = OutputFormatter::new(args.format.into());
    let rendered = formatter.format_graph(&context.graph)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered)
                .with_context(|| format!("Failed to write graph to {}", path.display()))?;
            info!(output = %path.display(), "Dependency graph written");
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use serial_test::serial;
    use tempfile::TempDir;

    fn cap_project(root: &Path) {
        fs::create_dir_all(root.join("bookshop/db")).unwrap();
        fs::create_dir_all(root.join("bookshop/srv")).unwrap();
        fs::write(
            root.join("bookshop/package.json"),
            r#"{"name": "bookshop", "dependencies": {"@sap/cds": "^8"}}"#,
        )
        .unwrap();
        fs::write(
            root.join("bookshop/db/schema.cds"),
            "namespace shop;\nentity Books { key ID: Integer; }\n",
        )
        .unwrap();
        fs::write(
            root.join("bookshop/srv/cat-service.cds"),
            "using { shop } from '../db/schema';\nservice CatalogService {}\n",
        )
        .unwrap();
    }

    #[test]
    #[serial]
    fn test_debug_parser_writes_graph() {
        let dir = TempDir::new().unwrap();
        cap_project(dir.path());
        let output = dir.path().join("graph.json");

        let code = handle_debug_parser(&DebugParserArgs {
            source_root: dir.path().to_path_buf(),
            format: OutputFormatArg::Json,
            output: Some(output.clone()),
        });

        assert_eq!(code, 0);
        let graph: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert!(graph["projects"]["bookshop"].is_object());
    }

    #[test]
    #[serial]
    fn test_debug_parser_without_projects() {
        let dir = TempDir::new().unwrap();
        let code = handle_debug_parser(&DebugParserArgs {
            source_root: dir.path().to_path_buf(),
            format: OutputFormatArg::Human,
            output: None,
        });
        assert_eq!(code, 1);
    }

    #[test]
    fn test_resolve_source_root_keeps_missing_paths() {
        let missing = Path::new("/nonexistent/cds-extractor/root");
        assert_eq!(resolve_source_root(missing), missing.to_path_buf());
    }
}
