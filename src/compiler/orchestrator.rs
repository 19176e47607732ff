//! Two-phase compilation over the dependency graph
//!
//! Planning resolves one compiler command per project and turns each plan into tasks.
//! Execution runs every task once, highest priority first. Failures are recorded on
//! the graph and never stop the remaining tasks.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::command::{CommandAnalysis, CommandResolver};
use super::compile::{CdsCompiler, CompileError, CompileOutcome};
use super::task::{build_tasks, CompilationAttempt, TaskKind, TaskStatus};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::progress::ProgressEvent;
use crate::project::graph::{DependencyGraph, ExtractionPhase, ProjectStatus};
use crate::project::paths::absolute;
use crate::session::ExtractorSession;

/// Compiler command chosen for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCommand {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

pub struct CompilationOrchestrator<'a> {
    session: &'a ExtractorSession,
    resolver: CommandResolver<'a>,
    project_commands: BTreeMap<String, ProjectCommand>,
}

impl<'a> CompilationOrchestrator<'a> {
    pub fn new(session: &'a ExtractorSession) -> Self {
        let resolver = CommandResolver::new(
            session.commands(),
            session.source_root(),
            &session.cache_root(),
        );
        Self {
            session,
            resolver,
            project_commands: BTreeMap::new(),
        }
    }

    pub fn project_commands(&self) -> &BTreeMap<String, ProjectCommand> {
        &self.project_commands
    }

    /// Probes every command candidate for `cache_dir`.
    pub fn analyze(&self, cache_dir: Option<&Path>) -> CommandAnalysis {
        self.resolver.analyze(cache_dir)
    }

    /// Plans and executes in one call.
    pub fn orchestrate(&mut self, graph: &mut DependencyGraph, cache_dirs: &BTreeMap<String, PathBuf>) {
        self.plan(graph, cache_dirs);
        self.execute(graph);
    }

    pub fn plan(&mut self, graph: &mut DependencyGraph, cache_dirs: &BTreeMap<String, PathBuf>) {
        graph.current_phase = ExtractionPhase::CompilationPlanning;
        info!(projects = graph.projects.len(), "Planning CDS compilation");

        let mut failures = Vec::new();

        for (project_dir, project) in graph.projects.iter_mut() {
            let cache_dir = cache_dirs.get(project_dir).cloned();
            let command = self.resolver.resolve(cache_dir.as_deref());

            match build_tasks(project) {
                Ok(tasks) => {
                    debug!(
                        project = %project_dir,
                        command = %command,
                        tasks = tasks.len(),
                        "Planned compilation tasks"
                    );
                    project.compilation_tasks = tasks;
                    project.status = ProjectStatus::CompilationPlanned;
                    project.timestamps.compilation_started = Some(Utc::now());
                    self.project_commands
                        .insert(project_dir.clone(), ProjectCommand { command, cache_dir });
                }
                Err(e) => {
                    error!(project = %project_dir, error = %e, "Failed to plan compilation");
                    project.status = ProjectStatus::Failed;
                    failures.push(format!(
                        "Failed to plan compilation for project {}: {}",
                        project_dir, e
                    ));
                }
            }
        }

        for message in failures {
            graph.record_critical(ExtractionPhase::CompilationPlanning, message);
        }

        graph.status_summary.total_compilation_tasks = graph.total_tasks();
        info!(
            tasks = graph.status_summary.total_compilation_tasks,
            "Compilation planning complete"
        );
    }

    pub fn execute(&self, graph: &mut DependencyGraph) {
        graph.current_phase = ExtractionPhase::Compiling;
        let start = Instant::now();

        // Stable sort keeps planning order within a priority.
        let mut order: Vec<(String, usize, u32)> = graph
            .projects
            .iter()
            .flat_map(|(dir, project)| {
                project
                    .compilation_tasks
                    .iter()
                    .enumerate()
                    .map(move |(idx, task)| (dir.clone(), idx, task.priority))
            })
            .collect();
        order.sort_by(|a, b| b.2.cmp(&a.2));

        info!(tasks = order.len(), "Executing compilation tasks");

        for (project_dir, idx, _) in order {
            self.run_task(graph, &project_dir, idx);
        }

        for project in graph.projects.values_mut() {
            if project.status == ProjectStatus::Failed && project.compilation_tasks.is_empty() {
                continue;
            }
            if project.compilation_tasks.iter().all(|t| t.status.is_terminal()) {
                project.status = if project.tasks_with_status(TaskStatus::Failed) > 0 {
                    ProjectStatus::Failed
                } else {
                    ProjectStatus::Completed
                };
                project.timestamps.compilation_completed = Some(Utc::now());
            }
        }

        let summary = &mut graph.status_summary;
        summary.performance.compilation_duration_ms = start.elapsed().as_millis() as u64;
        summary.overall_success = summary.failed_compilations == 0 && summary.critical_errors.is_empty();
        graph.current_phase = if graph.status_summary.overall_success {
            ExtractionPhase::Completed
        } else {
            ExtractionPhase::Failed
        };

        info!(
            successful = graph.status_summary.successful_compilations,
            failed = graph.status_summary.failed_compilations,
            json_files = graph.status_summary.json_files_generated,
            elapsed_ms = graph.status_summary.performance.compilation_duration_ms,
            "Compilation complete"
        );
    }

    fn run_task(&self, graph: &mut DependencyGraph, project_dir: &str, idx: usize) {
        let Some(project_command) = self.project_commands.get(project_dir) else {
            let reason = format!("no compiler command planned for project {}", project_dir);
            fail_without_attempt(graph, project_dir, idx, reason);
            return;
        };

        if let Some(project) = graph.projects.get_mut(project_dir) {
            project.status = ProjectStatus::Compiling;
            project.compilation_tasks[idx].status = TaskStatus::InProgress;
        }

        let compiler = CdsCompiler::new(
            self.session.source_root(),
            project_command.command.clone(),
            project_command.cache_dir.clone(),
        );

        let (kind, first_file) = {
            let task = &graph.projects[project_dir].compilation_tasks[idx];
            (task.kind, task.source_files.first().cloned())
        };

        let started_at = Utc::now();
        let timer = Instant::now();
        let result: Result<CompileOutcome, CompileError> = match (kind, first_file) {
            (TaskKind::Project, _) => compiler.compile_project(&graph.projects[project_dir]),
            (TaskKind::File, Some(file)) => compiler.compile_file(&file),
            (TaskKind::File, None) => {
                fail_without_attempt(graph, project_dir, idx, "task has no source files".to_string());
                return;
            }
        };
        let duration = timer.elapsed();

        let attempt = CompilationAttempt {
            id: Uuid::new_v4().simple().to_string(),
            command: project_command.command.clone(),
            cache_dir: project_command
                .cache_dir
                .as_ref()
                .map(|d| d.display().to_string()),
            started_at,
            finished_at: Utc::now(),
            duration_ms: duration.as_millis() as u64,
            success: result.is_ok(),
            output_path: result.as_ref().ok().map(|o| o.output_path.clone()),
            error: result.as_ref().err().map(|e| e.to_string()),
        };

        let source_root = self.session.source_root();
        let Some(project) = graph.projects.get_mut(project_dir) else {
            return;
        };
        let task = &mut project.compilation_tasks[idx];
        task.attempts.push(attempt);

        let success = match &result {
            Ok(outcome) => {
                task.status = TaskStatus::Success;
                graph.status_summary.successful_compilations += 1;
                if absolute(source_root, &outcome.output_path).exists() {
                    graph.status_summary.json_files_generated += 1;
                }
                debug!(task = %task.id, output = %outcome.output_path, "Compilation succeeded");
                true
            }
            Err(e) => {
                let message = e.to_string();
                task.status = TaskStatus::Failed;
                task.error_summary = Some(message.clone());
                graph.status_summary.failed_compilations += 1;
                error!(task = %task.id, project = %project_dir, error = %message, "Compilation failed");

                for file in &task.source_files {
                    self.session.report(&Diagnostic::new(
                        DiagnosticKind::CompilationFailure,
                        absolute(source_root, file),
                        message.clone(),
                    ));
                }
                false
            }
        };

        self.session.emit(ProgressEvent::TaskComplete {
            task_id: task.id.clone(),
            project_dir: project_dir.to_string(),
            success,
            duration,
        });
    }
}

/// Terminal failure for a task that never reached the compiler. Counted with the other
/// failures so the summary always adds up to the planned total.
fn fail_without_attempt(graph: &mut DependencyGraph, project_dir: &str, idx: usize, reason: String) {
    let Some(task) = graph
        .projects
        .get_mut(project_dir)
        .and_then(|p| p.compilation_tasks.get_mut(idx))
    else {
        return;
    };
    task.status = TaskStatus::Failed;
    task.error_summary = Some(reason.clone());
    let message = format!("Failed to execute compilation task {}: {}", task.id, reason);
    error!(project = %project_dir, "{}", message);

    graph.status_summary.failed_compilations += 1;
    graph.record_critical(ExtractionPhase::Compiling, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::command::{CommandProbe, CommandProber};
    use crate::config::ExtractorConfig;
    use crate::project::planner::CompilationPlan;
    use crate::project::ProjectRecord;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Nothing probes successfully, so the default npx command is planned.
    struct NoCommands;

    impl CommandProber for NoCommands {
        fn probe(&self, _command: &str, _cwd: &Path) -> CommandProbe {
            CommandProbe {
                works: false,
                version: None,
                error: Some("not found".to_string()),
            }
        }
    }

    fn session(dir: &TempDir) -> ExtractorSession {
        ExtractorSession::new(ExtractorConfig::default(), dir.path())
            .with_command_prober(Arc::new(NoCommands))
    }

    fn graph_with(dir: &TempDir, records: Vec<ProjectRecord>) -> DependencyGraph {
        let mut graph = DependencyGraph::new(dir.path());
        for record in records {
            graph.projects.insert(record.project_dir.clone(), record);
        }
        graph
    }

    #[test]
    fn test_planning_creates_tasks() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let mut shop = ProjectRecord::new("shop", vec!["shop/db/a.cds".to_string()], None);
        shop.plan = CompilationPlan::ProjectLevel;
        let mut lib = ProjectRecord::new(
            "lib",
            vec!["lib/a.cds".to_string(), "lib/b.cds".to_string()],
            None,
        );
        lib.plan = CompilationPlan::PerFile(lib.cds_files.clone());
        let mut graph = graph_with(&dir, vec![shop, lib]);

        let mut orchestrator = CompilationOrchestrator::new(&session);
        orchestrator.plan(&mut graph, &BTreeMap::new());

        assert_eq!(graph.status_summary.total_compilation_tasks, 3);
        assert_eq!(graph.projects["shop"].status, ProjectStatus::CompilationPlanned);
        assert!(graph.projects["lib"].timestamps.compilation_started.is_some());
        assert_eq!(
            orchestrator.project_commands()["lib"].command,
            "npx -y --package @sap/cds-dk cds"
        );
    }

    #[test]
    fn test_planning_failure_is_contained() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let mut bad = ProjectRecord::new("bad", vec!["bad/a.cds".to_string()], None);
        bad.plan = CompilationPlan::PerFile(vec!["other/x.cds".to_string()]);
        let mut good = ProjectRecord::new("good", vec!["good/a.cds".to_string()], None);
        good.plan = CompilationPlan::PerFile(good.cds_files.clone());
        let mut graph = graph_with(&dir, vec![bad, good]);

        let mut orchestrator = CompilationOrchestrator::new(&session);
        orchestrator.plan(&mut graph, &BTreeMap::new());

        assert_eq!(graph.projects["bad"].status, ProjectStatus::Failed);
        assert_eq!(graph.projects["good"].status, ProjectStatus::CompilationPlanned);
        assert_eq!(graph.errors.critical.len(), 1);
        assert_eq!(graph.errors.critical[0].phase, ExtractionPhase::CompilationPlanning);
        assert!(graph.status_summary.critical_errors[0].contains("bad"));
    }

    #[test]
    fn test_missing_sources_fail_their_tasks_only() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let mut lib = ProjectRecord::new(
            "lib",
            vec!["lib/a.cds".to_string(), "lib/b.cds".to_string()],
            None,
        );
        lib.plan = CompilationPlan::PerFile(lib.cds_files.clone());
        let mut graph = graph_with(&dir, vec![lib]);

        let mut orchestrator = CompilationOrchestrator::new(&session);
        orchestrator.orchestrate(&mut graph, &BTreeMap::new());

        let lib = &graph.projects["lib"];
        assert_eq!(lib.status, ProjectStatus::Failed);
        assert_eq!(lib.tasks_with_status(TaskStatus::Failed), 2);
        assert_eq!(lib.compilation_tasks[0].attempts.len(), 1);
        assert_eq!(
            lib.compilation_tasks[0].error_summary.as_deref(),
            Some("Expected CDS file 'lib/a.cds' does not exist.")
        );
        assert!(lib.timestamps.compilation_completed.is_some());
        assert_eq!(graph.status_summary.failed_compilations, 2);
        assert!(!graph.status_summary.overall_success);
        assert_eq!(graph.current_phase, ExtractionPhase::Failed);
    }

    #[test]
    fn test_unplanned_task_fails_and_is_counted() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);

        let mut lib = ProjectRecord::new("lib", vec!["lib/a.cds".to_string()], None);
        lib.plan = CompilationPlan::PerFile(lib.cds_files.clone());
        lib.compilation_tasks = build_tasks(&lib).unwrap();
        let mut graph = graph_with(&dir, vec![lib]);
        graph.status_summary.total_compilation_tasks = graph.total_tasks();

        // No plan() call, so "lib" has no command.
        CompilationOrchestrator::new(&session).execute(&mut graph);

        let lib = &graph.projects["lib"];
        assert_eq!(lib.compilation_tasks[0].status, TaskStatus::Failed);
        assert!(lib.compilation_tasks[0].attempts.is_empty());
        assert_eq!(
            lib.compilation_tasks[0].error_summary.as_deref(),
            Some("no compiler command planned for project lib")
        );
        assert_eq!(lib.status, ProjectStatus::Failed);
        assert_eq!(graph.status_summary.failed_compilations, 1);
        assert_eq!(
            graph.status_summary.successful_compilations + graph.status_summary.failed_compilations,
            graph.status_summary.total_compilation_tasks
        );
        assert_eq!(graph.errors.critical.len(), 1);
        assert!(!graph.status_summary.overall_success);
        assert_eq!(graph.current_phase, ExtractionPhase::Failed);
    }

    #[test]
    fn test_empty_graph_succeeds() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir);
        let mut graph = DependencyGraph::new(dir.path());

        let mut orchestrator = CompilationOrchestrator::new(&session);
        orchestrator.orchestrate(&mut graph, &BTreeMap::new());

        assert!(graph.status_summary.overall_success);
        assert_eq!(graph.current_phase, ExtractionPhase::Completed);
    }
}
