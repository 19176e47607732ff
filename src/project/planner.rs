//! Per-project compilation planning
//!
//! Decides whether a project is compiled file by file or as a single unit.

use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use tracing::{debug, warn};

use super::graph::ProjectRecord;
use super::paths::{in_project, parent_key, ROOT_DIR};

/// Legacy list marker emitted in debug dumps for project-level plans
pub const PROJECT_LEVEL_MARKER: &str = "__PROJECT_LEVEL_COMPILATION__";

/// Output of a project-level compilation, relative to the project directory
pub const PROJECT_MODEL_FILE: &str = "model.cds.json";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompilationPlan {
    /// One compiler invocation per listed root-relative file
    PerFile(Vec<String>),
    /// One invocation over the whole project producing `model.cds.json`
    #[default]
    ProjectLevel,
}

impl CompilationPlan {
    pub fn is_project_level(&self) -> bool {
        matches!(self, CompilationPlan::ProjectLevel)
    }

    /// Files compiled individually; empty for project-level plans
    pub fn files(&self) -> &[String] {
        match self {
            CompilationPlan::PerFile(files) => files,
            CompilationPlan::ProjectLevel => &[],
        }
    }

    /// Number of planned compiler invocations
    pub fn len(&self) -> usize {
        match self {
            CompilationPlan::PerFile(files) => files.len(),
            CompilationPlan::ProjectLevel => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Root-relative artifacts the plan should produce.
    pub fn expected_outputs(&self, project_dir: &str) -> Vec<String> {
        match self {
            CompilationPlan::ProjectLevel => vec![in_project(project_dir, PROJECT_MODEL_FILE)],
            CompilationPlan::PerFile(files) => files.iter().map(|f| format!("{}.json", f)).collect(),
        }
    }
}

impl Serialize for CompilationPlan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompilationPlan::ProjectLevel => [PROJECT_LEVEL_MARKER].serialize(serializer),
            CompilationPlan::PerFile(files) => files.serialize(serializer),
        }
    }
}

/// A plan together with its expected output artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPlan {
    pub plan: CompilationPlan,
    pub expected_output_files: Vec<String>,
}

/// Decides how `project` should be compiled.
///
/// Rules, first match wins:
/// 1. no files: nothing to compile
/// 2. one file: compile it
/// 3. several files with a CAP layout or a CAP manifest: project-level
/// 4. no import information: every file
/// 5. files no other file imports (relative imports only)
/// 6. no such root files, e.g. an import cycle: every file
pub fn plan_project(project: &ProjectRecord) -> ProjectPlan {
    let plan = determine_plan(project);
    let expected_output_files = match &plan {
        CompilationPlan::PerFile(files) if files.is_empty() => Vec::new(),
        plan => plan.expected_outputs(&project.project_dir),
    };
    ProjectPlan {
        plan,
        expected_output_files,
    }
}

fn determine_plan(project: &ProjectRecord) -> CompilationPlan {
    let files = &project.cds_files;

    if files.len() <= 1 {
        return CompilationPlan::PerFile(files.clone());
    }

    let has_cap_manifest = project
        .package_json
        .as_ref()
        .map(|m| m.has_cap_dependency())
        .unwrap_or(false);

    if has_typical_cap_structure(files) || has_cap_manifest {
        debug!(
            project = %project.project_dir,
            files = files.len(),
            "Using project-level compilation"
        );
        return CompilationPlan::ProjectLevel;
    }

    if project.imports.is_empty() {
        return CompilationPlan::PerFile(files.clone());
    }

    let imported: BTreeSet<&str> = project
        .imports
        .values()
        .flatten()
        .filter(|import| import.is_relative)
        .filter_map(|import| import.resolved_path.as_deref())
        .collect();

    let root_files: Vec<String> = files
        .iter()
        .filter(|f| !imported.contains(f.as_str()))
        .cloned()
        .collect();

    if root_files.is_empty() {
        warn!(
            project = %project.project_dir,
            "No root CDS files identified, compiling all files individually"
        );
        return CompilationPlan::PerFile(files.clone());
    }

    CompilationPlan::PerFile(root_files)
}

/// Files spread over `db`-like and `srv`-like folders, or over two or more directories
/// below the source root.
pub fn has_typical_cap_structure(files: &[String]) -> bool {
    let has_db = files
        .iter()
        .any(|f| f.contains("db/") || f.contains("database/"));
    let has_srv = files
        .iter()
        .any(|f| f.contains("srv/") || f.contains("service/"));
    if has_db && has_srv {
        return true;
    }

    let dirs: BTreeSet<&str> = files
        .iter()
        .map(|f| parent_key(f))
        .filter(|d| *d != ROOT_DIR && !d.is_empty())
        .collect();
    dirs.len() >= 2
}
