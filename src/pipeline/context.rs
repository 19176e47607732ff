//! Mutable state threaded through the pipeline phases

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::compiler::command::CommandAnalysis;
use crate::compiler::orchestrator::ProjectCommand;
use crate::packages::installer::InstallSummary;
use crate::project::graph::DependencyGraph;

pub struct ExtractionContext {
    pub graph: DependencyGraph,

    /// Project directory to its installed dependency cache
    pub cache_dirs: BTreeMap<String, PathBuf>,

    pub install_summary: Option<InstallSummary>,

    /// Compiler command planned per project
    pub project_commands: BTreeMap<String, ProjectCommand>,

    /// Candidate probe results, collected in debug runs only
    pub command_analysis: Option<CommandAnalysis>,

    /// Outcome of the JavaScript extractor, when it ran
    pub extractor_result: Option<Result<(), String>>,
}

impl ExtractionContext {
    pub fn new(source_root: &Path) -> Self {
        Self {
            graph: DependencyGraph::new(source_root),
            cache_dirs: BTreeMap::new(),
            install_summary: None,
            project_commands: BTreeMap::new(),
            command_analysis: None,
            extractor_result: None,
        }
    }

    pub fn extractor_failed(&self) -> bool {
        matches!(self.extractor_result, Some(Err(_)))
    }
}
