//! Plain-text status report for the end of a run

use std::collections::BTreeMap;
use std::fmt::Write;

use super::command::CommandAnalysis;
use super::orchestrator::ProjectCommand;
use crate::packages::registry::CacheStats;
use crate::project::graph::DependencyGraph;

const RULE_WIDTH: usize = 80;

/// Extra sections shown by `debug-compiler`
pub struct DebugDetails<'a> {
    pub project_commands: &'a BTreeMap<String, ProjectCommand>,
    pub analysis: Option<&'a CommandAnalysis>,
    pub version_cache: CacheStats,
}

pub fn generate_status_report(graph: &DependencyGraph) -> String {
    render(graph, None)
}

pub fn generate_debug_report(graph: &DependencyGraph, details: &DebugDetails<'_>) -> String {
    render(graph, Some(details))
}

fn render(graph: &DependencyGraph, debug: Option<&DebugDetails<'_>>) -> String {
    let summary = &graph.status_summary;
    let perf = &summary.performance;
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "CDS EXTRACTOR {}STATUS REPORT",
        if debug.is_some() { "DEBUG " } else { "" }
    );
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out);

    let _ = writeln!(out, "OVERALL SUMMARY:");
    let _ = writeln!(
        out,
        "  Status: {}",
        if summary.overall_success { "SUCCESS" } else { "FAILED" }
    );
    let _ = writeln!(out, "  Current Phase: {}", graph.current_phase.as_str().to_uppercase());
    let _ = writeln!(out, "  Projects: {}", summary.total_projects);
    let _ = writeln!(out, "  CDS Files: {}", summary.total_cds_files);
    let _ = writeln!(out, "  JSON Files Generated: {}", summary.json_files_generated);
    let _ = writeln!(out);

    let _ = writeln!(out, "COMPILATION SUMMARY:");
    let _ = writeln!(out, "  Total Tasks: {}", summary.total_compilation_tasks);
    let _ = writeln!(out, "  Successful: {}", summary.successful_compilations);
    let _ = writeln!(out, "  Retried: {}", summary.retried_compilations);
    let _ = writeln!(out, "  Failed: {}", summary.failed_compilations);
    let _ = writeln!(out, "  Skipped: {}", summary.skipped_compilations);
    let _ = writeln!(out);

    let _ = writeln!(out, "PERFORMANCE:");
    let _ = writeln!(out, "  Total Duration: {}ms", perf.total_duration_ms);
    let _ = writeln!(out, "  Parsing: {}ms", perf.parsing_duration_ms);
    let _ = writeln!(out, "  Compilation: {}ms", perf.compilation_duration_ms);
    let _ = writeln!(out, "  Extraction: {}ms", perf.extraction_duration_ms);
    let _ = writeln!(out);

    if !summary.critical_errors.is_empty() {
        let _ = writeln!(out, "CRITICAL ERRORS:");
        for message in &summary.critical_errors {
            let _ = writeln!(out, "  - {}", message);
        }
        let _ = writeln!(out);
    }

    if !summary.warnings.is_empty() {
        let _ = writeln!(out, "WARNINGS:");
        for message in &summary.warnings {
            let _ = writeln!(out, "  - {}", message);
        }
        let _ = writeln!(out);
    }

    if let Some(details) = debug {
        render_debug(&mut out, graph, details);
    }

    let _ = writeln!(out, "{}", rule);
    out
}

fn render_debug(out: &mut String, graph: &DependencyGraph, details: &DebugDetails<'_>) {
    let _ = writeln!(out, "PROJECT DETAILS:");
    for project in graph.projects.values() {
        let _ = writeln!(
            out,
            "  {} [{}] files={} tasks={} dependencies={}",
            project.project_dir,
            project.status,
            project.cds_files.len(),
            project.compilation_tasks.len(),
            project.dependencies.len()
        );
        if let Some(command) = details.project_commands.get(&project.project_dir) {
            let _ = writeln!(out, "    command: {}", command.command);
            if let Some(cache_dir) = &command.cache_dir {
                let _ = writeln!(out, "    cache: {}", cache_dir.display());
            }
        }
        for task in &project.compilation_tasks {
            if let Some(error) = &task.error_summary {
                let first_line = error.lines().next().unwrap_or_default();
                let _ = writeln!(out, "    failed {}: {}", task.id, first_line);
            }
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "COMPILER DEBUG:");
    let _ = writeln!(
        out,
        "  Version cache: {} hits, {} misses ({}% hit rate)",
        details.version_cache.hits,
        details.version_cache.misses,
        details.version_cache.hit_rate()
    );
    if let Some(analysis) = details.analysis {
        let _ = writeln!(
            out,
            "  Selected command: {}",
            analysis.selected_command.as_deref().unwrap_or("none")
        );
        for candidate in &analysis.candidates {
            let outcome = if candidate.probe.works {
                format!("ok ({})", candidate.probe.version.as_deref().unwrap_or("unknown"))
            } else {
                format!("failed ({})", candidate.probe.error.as_deref().unwrap_or("unknown"))
            };
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                candidate.strategy.label(),
                candidate.command,
                outcome
            );
        }
    }
    let _ = writeln!(out);
}
