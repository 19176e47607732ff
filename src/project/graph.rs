//! Dependency graph over detected CDS projects
//!
//! The graph is the single mutable record of a run. It is built here in three passes
//! (files and manifests, imports and cross-project edges, compilation plans) and then
//! mutated in place by the installer and the compilation orchestrator.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::detector::{DetectionError, ProjectDetector};
use super::imports::{extract_imports_from_file, ImportReference};
use super::manifest::PackageJson;
use super::paths::{absolute, is_strict_descendant, relative_key};
use super::planner::{plan_project, CompilationPlan};
use super::walk;
use crate::compiler::task::{CompilationTask, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPhase {
    Parsing,
    DependencyResolution,
    CompilationPlanning,
    Compiling,
    Extracting,
    Completed,
    Failed,
}

impl ExtractionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPhase::Parsing => "parsing",
            ExtractionPhase::DependencyResolution => "dependency_resolution",
            ExtractionPhase::CompilationPlanning => "compilation_planning",
            ExtractionPhase::Compiling => "compiling",
            ExtractionPhase::Extracting => "extracting",
            ExtractionPhase::Completed => "completed",
            ExtractionPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for ExtractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Discovered,
    DependenciesResolved,
    CompilationPlanned,
    Compiling,
    Completed,
    Failed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Discovered => "discovered",
            ProjectStatus::DependenciesResolved => "dependencies_resolved",
            ProjectStatus::CompilationPlanned => "compilation_planned",
            ProjectStatus::Compiling => "compiling",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTimestamps {
    pub discovered: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies_resolved: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_started: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compilation_completed: Option<DateTime<Utc>>,
}

impl Default for ProjectTimestamps {
    fn default() -> Self {
        Self {
            discovered: Utc::now(),
            dependencies_resolved: None,
            compilation_started: None,
            compilation_completed: None,
        }
    }
}

/// One detected CDS project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub project_dir: String,
    pub cds_files: Vec<String>,
    #[serde(rename = "cdsFilesToCompile")]
    pub plan: CompilationPlan,
    pub expected_output_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_json: Option<PackageJson>,
    /// Directories of other projects this one imports from
    pub dependencies: Vec<String>,
    pub imports: BTreeMap<String, Vec<ImportReference>>,
    pub compilation_tasks: Vec<CompilationTask>,
    pub status: ProjectStatus,
    pub timestamps: ProjectTimestamps,
}

impl ProjectRecord {
    pub fn new(project_dir: &str, cds_files: Vec<String>, package_json: Option<PackageJson>) -> Self {
        Self {
            project_dir: project_dir.to_string(),
            cds_files,
            plan: CompilationPlan::PerFile(Vec::new()),
            expected_output_files: Vec::new(),
            package_json,
            dependencies: Vec::new(),
            imports: BTreeMap::new(),
            compilation_tasks: Vec::new(),
            status: ProjectStatus::Discovered,
            timestamps: ProjectTimestamps::default(),
        }
    }

    pub fn tasks_with_status(&self, status: TaskStatus) -> usize {
        self.compilation_tasks
            .iter()
            .filter(|t| t.status == status)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractorError {
    pub phase: ExtractionPhase,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphErrors {
    pub critical: Vec<ExtractorError>,
    pub warnings: Vec<ExtractorError>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_duration_ms: u64,
    pub parsing_duration_ms: u64,
    pub compilation_duration_ms: u64,
    pub extraction_duration_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub overall_success: bool,
    pub total_projects: usize,
    pub total_cds_files: usize,
    pub total_compilation_tasks: usize,
    pub successful_compilations: usize,
    pub failed_compilations: usize,
    pub skipped_compilations: usize,
    pub retried_compilations: usize,
    pub json_files_generated: usize,
    pub critical_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub performance: PerformanceSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyGraph {
    pub source_root_dir: PathBuf,
    pub projects: BTreeMap<String, ProjectRecord>,
    pub current_phase: ExtractionPhase,
    pub status_summary: StatusSummary,
    pub errors: GraphErrors,
}

impl DependencyGraph {
    pub fn new(source_root_dir: &Path) -> Self {
        Self {
            source_root_dir: source_root_dir.to_path_buf(),
            projects: BTreeMap::new(),
            current_phase: ExtractionPhase::Parsing,
            status_summary: StatusSummary::default(),
            errors: GraphErrors::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn record_critical(&mut self, phase: ExtractionPhase, message: impl Into<String>) {
        let message = message.into();
        self.status_summary.critical_errors.push(message.clone());
        self.errors.critical.push(ExtractorError {
            phase,
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn record_warning(&mut self, phase: ExtractionPhase, message: impl Into<String>) {
        let message = message.into();
        self.status_summary.warnings.push(message.clone());
        self.errors.warnings.push(ExtractorError {
            phase,
            message,
            timestamp: Utc::now(),
        });
    }

    /// Project whose file list contains `cds_file`; the first in key order wins.
    pub fn project_for_file(&self, cds_file: &str) -> Option<&str> {
        self.projects
            .values()
            .find(|p| p.cds_files.iter().any(|f| f == cds_file))
            .map(|p| p.project_dir.as_str())
    }

    pub fn total_cds_files(&self) -> usize {
        self.projects.values().map(|p| p.cds_files.len()).sum()
    }

    pub fn total_tasks(&self) -> usize {
        self.projects.values().map(|p| p.compilation_tasks.len()).sum()
    }
}

/// Builds a [`DependencyGraph`] for a source root.
pub struct DependencyGraphBuilder {
    detector: ProjectDetector,
}

impl DependencyGraphBuilder {
    pub fn new(source_root: &Path) -> Result<Self, DetectionError> {
        Ok(Self {
            detector: ProjectDetector::new(source_root)?,
        })
    }

    pub fn source_root(&self) -> &Path {
        self.detector.source_root()
    }

    pub fn build(&self) -> DependencyGraph {
        let start = Instant::now();
        let source_root = self.detector.source_root();
        let mut graph = DependencyGraph::new(source_root);

        info!(source_root = %source_root.display(), "Building CDS project dependency graph");
        let project_dirs = self.detector.detect();

        if project_dirs.is_empty() {
            info!("No CDS projects found");
            graph.status_summary.performance.parsing_duration_ms = start.elapsed().as_millis() as u64;
            return graph;
        }

        for project_dir in &project_dirs {
            let record = self.load_project(project_dir);
            debug!(
                project = %project_dir,
                files = record.cds_files.len(),
                has_manifest = record.package_json.is_some(),
                "Loaded project"
            );
            graph.projects.insert(project_dir.clone(), record);
        }

        self.resolve_imports(&mut graph);

        for project in graph.projects.values_mut() {
            let plan = plan_project(project);
            info!(
                project = %project.project_dir,
                to_compile = plan.plan.len(),
                total = project.cds_files.len(),
                project_level = plan.plan.is_project_level(),
                "Planned project compilation"
            );
            project.plan = plan.plan;
            project.expected_output_files = plan.expected_output_files;
        }

        graph.status_summary.total_projects = graph.projects.len();
        graph.status_summary.total_cds_files = graph.total_cds_files();
        graph.status_summary.performance.parsing_duration_ms = start.elapsed().as_millis() as u64;
        graph.current_phase = ExtractionPhase::DependencyResolution;

        info!(
            projects = graph.status_summary.total_projects,
            cds_files = graph.status_summary.total_cds_files,
            elapsed_ms = graph.status_summary.performance.parsing_duration_ms,
            "Dependency graph built"
        );
        graph
    }

    fn load_project(&self, project_dir: &str) -> ProjectRecord {
        let source_root = self.detector.source_root();
        let dir = absolute(source_root, project_dir);

        let mut cds_files: Vec<String> = walk::find_cds_files(&dir)
            .iter()
            .filter_map(|f| relative_key(source_root, f))
            .collect();
        cds_files.sort();
        cds_files.dedup();

        ProjectRecord::new(project_dir, cds_files, PackageJson::read_optional(&dir))
    }

    /// Extracts imports for every file and records cross-project edges.
    fn resolve_imports(&self, graph: &mut DependencyGraph) {
        let source_root = self.detector.source_root().to_path_buf();

        // (project_dir, its files) snapshot for edge lookups
        let owners: Vec<(String, HashSet<String>)> = graph
            .projects
            .values()
            .filter(|p| !p.cds_files.is_empty())
            .map(|p| (p.project_dir.clone(), p.cds_files.iter().cloned().collect()))
            .collect();

        let mut warnings = Vec::new();

        for project in graph.projects.values_mut() {
            for file in project.cds_files.clone() {
                let mut imports = match extract_imports_from_file(&absolute(&source_root, &file)) {
                    Ok(imports) => imports,
                    Err(e) => {
                        warn!(file = %file, error = %e, "Error processing imports");
                        warnings.push(format!("Error processing imports in {}: {}", file, e));
                        continue;
                    }
                };

                for import in &mut imports {
                    if import.is_relative {
                        let Some(target) = import.resolve_against(&file).map(str::to_string) else {
                            debug!(file = %file, import = %import.path, "Import resolves outside the source root");
                            continue;
                        };

                        for (other_dir, other_files) in &owners {
                            if *other_dir == project.project_dir {
                                continue;
                            }
                            let owned = other_files.contains(&target)
                                || is_strict_descendant(&target, other_dir);
                            if owned && !project.dependencies.contains(other_dir) {
                                debug!(
                                    from = %project.project_dir,
                                    to = %other_dir,
                                    "Cross-project dependency"
                                );
                                project.dependencies.push(other_dir.clone());
                            }
                        }
                    } else if import.is_module {
                        if let Some(manifest) = &project.package_json {
                            if manifest.declares_module(&import.path) {
                                debug!(file = %file, module = %import.path, "Module import declared in package.json");
                            }
                        }
                    }
                }

                project.imports.insert(file, imports);
            }
        }

        for message in warnings {
            graph.record_warning(ExtractionPhase::Parsing, message);
        }
    }
}
