//! Compilation runs against a fake `cds` executable
#![cfg(unix)]

mod support;

use cds_extractor::compiler::{generate_status_report, TaskKind, TaskStatus};
use cds_extractor::diagnostics::{DiagnosticKind, RecordingDiagnostics};
use cds_extractor::pipeline::{ExtractionContext, ExtractionPipeline};
use cds_extractor::progress::NoOpHandler;
use cds_extractor::project::{ExtractionPhase, ProjectStatus};
use cds_extractor::{ExtractorConfig, ExtractorSession};
use serial_test::serial;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use support::{copy_fixture, install_fake_compiler};

fn config() -> ExtractorConfig {
    ExtractorConfig {
        skip_install: true,
        ..ExtractorConfig::default()
    }
}

fn compile(root: &Path, diagnostics: Arc<RecordingDiagnostics>) -> ExtractionContext {
    let session = ExtractorSession::new(config(), root)
        .with_diagnostics(Box::new(diagnostics))
        .with_progress(Arc::new(NoOpHandler));
    let mut context = ExtractionContext::new(root);
    ExtractionPipeline::debug_compiler(true)
        .execute(&session, &mut context)
        .expect("pipeline should not abort");
    context
}

#[test]
#[serial]
fn test_bookshop_compiles_as_project() {
    let dir = copy_fixture("bookshop");
    let cache_dir = install_fake_compiler(dir.path());
    let context = compile(dir.path(), Arc::new(RecordingDiagnostics::new()));

    let summary = &context.graph.status_summary;
    assert!(summary.overall_success);
    assert_eq!(summary.total_compilation_tasks, 1);
    assert_eq!(summary.successful_compilations, 1);
    assert_eq!(summary.json_files_generated, 1);
    assert_eq!(context.graph.current_phase, ExtractionPhase::Completed);
    assert!(dir.path().join("model.cds.json").is_file());

    let project = &context.graph.projects["."];
    assert_eq!(project.status, ProjectStatus::Completed);
    let task = &project.compilation_tasks[0];
    assert_eq!(task.kind, TaskKind::Project);
    assert_eq!(task.status, TaskStatus::Success);
    assert_eq!(task.attempts.len(), 1);
    assert!(task.attempts[0]
        .command
        .ends_with(".cds-extractor-cache/cds-fake/node_modules/.bin/cds"));

    let analysis = context.command_analysis.unwrap();
    assert_eq!(analysis.selected_version.as_deref(), Some("8.3.0"));
    assert_eq!(
        analysis.selected_command,
        Some(cache_dir.join("node_modules/.bin/cds").display().to_string())
    );
}

#[test]
#[serial]
fn test_monorepo_mixes_project_and_file_tasks() {
    let dir = copy_fixture("monorepo");
    install_fake_compiler(dir.path());
    let context = compile(dir.path(), Arc::new(RecordingDiagnostics::new()));

    let graph = &context.graph;
    assert!(graph.status_summary.overall_success);
    assert_eq!(graph.status_summary.successful_compilations, 2);

    // Project tasks run ahead of file tasks.
    let orders = &graph.projects["packages/orders"].compilation_tasks[0];
    let common = &graph.projects["packages/common"].compilation_tasks[0];
    assert_eq!(orders.kind, TaskKind::Project);
    assert_eq!(common.kind, TaskKind::File);
    assert!(orders.attempts[0].started_at <= common.attempts[0].started_at);

    assert!(dir.path().join("packages/orders/model.cds.json").is_file());
    assert!(dir.path().join("packages/common/db/types.cds.json").is_file());
}

#[test]
#[serial]
fn test_compile_failure_is_contained() {
    let dir = copy_fixture("standalone");
    fs::write(dir.path().join("models/broken.cds"), "entity {").unwrap();
    install_fake_compiler(dir.path());

    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let context = compile(dir.path(), diagnostics.clone());

    let graph = &context.graph;
    assert!(!graph.status_summary.overall_success);
    assert_eq!(graph.status_summary.successful_compilations, 1);
    assert_eq!(graph.status_summary.failed_compilations, 1);
    assert_eq!(graph.current_phase, ExtractionPhase::Failed);
    assert!(dir.path().join("models/main.cds.json").is_file());

    let project = &graph.projects["models"];
    assert_eq!(project.status, ProjectStatus::Failed);
    let failed = project
        .compilation_tasks
        .iter()
        .find(|t| t.status == TaskStatus::Failed)
        .unwrap();
    let error = failed.error_summary.as_deref().unwrap();
    assert!(error.starts_with("Could not compile the file models/broken.cds.\nReported error(s):\n```\n"));
    assert!(error.contains("Syntax error"));

    let records = diagnostics.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, DiagnosticKind::CompilationFailure);
    assert!(records[0].file_path.ends_with("models/broken.cds"));

    let report = generate_status_report(graph);
    assert!(report.contains("  Status: FAILED\n"));
    assert!(report.contains("  Failed: 1\n"));
}
