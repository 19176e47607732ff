//! CDS project discovery and the dependency graph

pub mod detector;
pub mod graph;
pub mod imports;
pub mod manifest;
pub mod paths;
pub mod planner;
pub mod walk;

pub use detector::{DetectionError, ProjectDetector};
pub use graph::{
    DependencyGraph, DependencyGraphBuilder, ExtractionPhase, ExtractorError, ProjectRecord,
    ProjectStatus, StatusSummary,
};
pub use imports::{extract_imports, ImportReference};
pub use manifest::PackageJson;
pub use planner::{plan_project, CompilationPlan, ProjectPlan};
