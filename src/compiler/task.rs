//! Compilation tasks and their attempt history

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

use crate::project::{CompilationPlan, ProjectRecord};

/// Project-level tasks run before file-level ones.
pub const PROJECT_TASK_PRIORITY: u32 = 10;
pub const FILE_TASK_PRIORITY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    File,
    Project,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::File => "file",
            TaskKind::Project => "project",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationAttempt {
    pub id: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationTask {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub source_files: Vec<String>,
    pub expected_output_files: Vec<String>,
    pub project_dir: String,
    pub attempts: Vec<CompilationAttempt>,
    pub dependencies: Vec<String>,
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_summary: Option<String>,
}

impl CompilationTask {
    fn new(
        kind: TaskKind,
        project: &ProjectRecord,
        source_files: Vec<String>,
        expected_output_files: Vec<String>,
    ) -> Self {
        let priority = match kind {
            TaskKind::Project => PROJECT_TASK_PRIORITY,
            TaskKind::File => FILE_TASK_PRIORITY,
        };
        Self {
            id: format!(
                "{}_{}_{}",
                kind.as_str(),
                project.project_dir,
                Uuid::new_v4().simple()
            ),
            kind,
            status: TaskStatus::Pending,
            source_files,
            expected_output_files,
            project_dir: project.project_dir.clone(),
            attempts: Vec::new(),
            dependencies: Vec::new(),
            priority,
            error_summary: None,
        }
    }

    /// Output of the first successful attempt
    pub fn output_path(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.success)
            .and_then(|a| a.output_path.as_deref())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("Planned file '{file}' is not part of project '{project}'")]
    FileNotInProject { project: String, file: String },

    #[error("Project '{project}' is planned for project-level compilation but has no CDS files")]
    ProjectLevelWithoutFiles { project: String },
}

/// Turns a project's [`CompilationPlan`] into tasks.
///
/// A project-level plan yields a single task over every project file. A per-file plan
/// yields one task per file with a `<file>.json` output.
pub fn build_tasks(project: &ProjectRecord) -> Result<Vec<CompilationTask>, PlanError> {
    match &project.plan {
        CompilationPlan::ProjectLevel => {
            if project.cds_files.is_empty() {
                return Err(PlanError::ProjectLevelWithoutFiles {
                    project: project.project_dir.clone(),
                });
            }
            Ok(vec![CompilationTask::new(
                TaskKind::Project,
                project,
                project.cds_files.clone(),
                project.expected_output_files.clone(),
            )])
        }
        CompilationPlan::PerFile(files) => {
            let known: HashSet<&str> = project.cds_files.iter().map(String::as_str).collect();
            files
                .iter()
                .map(|file| {
                    if !known.contains(file.as_str()) {
                        return Err(PlanError::FileNotInProject {
                            project: project.project_dir.clone(),
                            file: file.clone(),
                        });
                    }
                    Ok(CompilationTask::new(
                        TaskKind::File,
                        project,
                        vec![file.clone()],
                        vec![format!("{}.json", file)],
                    ))
                })
                .collect()
        }
    }
}
