use crate::compiler::orchestrator::CompilationOrchestrator;
use crate::pipeline::context::ExtractionContext;
use crate::pipeline::phase_trait::ExtractorPhase;
use crate::session::ExtractorSession;
use anyhow::Result;

/// Plans and runs every compilation task. Task failures stay on the graph.
pub struct CompilePhase {
    analyze_commands: bool,
}

impl CompilePhase {
    pub fn new() -> Self {
        Self {
            analyze_commands: false,
        }
    }

    /// Also probes every compiler candidate and keeps the results for the debug report.
    pub fn with_command_analysis(mut self) -> Self {
        self.analyze_commands = true;
        self
    }
}

impl Default for CompilePhase {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorPhase for CompilePhase {
    fn name(&self) -> &'static str {
        "CompilePhase"
    }

    fn execute(&self, context: &mut ExtractionContext, session: &ExtractorSession) -> Result<()> {
        let mut orchestrator = CompilationOrchestrator::new(session);

        if self.analyze_commands {
            let cache_dir = context.cache_dirs.values().next().map(|d| d.as_path());
            context.command_analysis = Some(orchestrator.analyze(cache_dir));
        }

        orchestrator.orchestrate(&mut context.graph, &context.cache_dirs);
        context.project_commands = orchestrator.project_commands().clone();
        Ok(())
    }
}
