use crate::pipeline::context::ExtractionContext;
use crate::pipeline::phase_trait::ExtractorPhase;
use crate::project::graph::DependencyGraphBuilder;
use crate::session::ExtractorSession;
use anyhow::{bail, Context, Result};
use tracing::info;

/// Detects projects and builds the dependency graph.
pub struct ParsePhase;

impl ExtractorPhase for ParsePhase {
    fn name(&self) -> &'static str {
        "ParsePhase"
    }

    fn execute(&self, context: &mut ExtractionContext, session: &ExtractorSession) -> Result<()> {
        let source_root = session.source_root();
        let builder = DependencyGraphBuilder::new(source_root).with_context(|| {
            format!(
                "Failed to build CDS project dependency graph for {}",
                source_root.display()
            )
        })?;

        context.graph = builder.build();

        if context.graph.is_empty() {
            bail!(
                "No CDS projects were detected in {}",
                source_root.display()
            );
        }

        info!(
            projects = context.graph.status_summary.total_projects,
            cds_files = context.graph.status_summary.total_cds_files,
            "Dependency graph ready"
        );
        Ok(())
    }
}
