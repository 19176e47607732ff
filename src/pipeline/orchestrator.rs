use super::context::ExtractionContext;
use super::phase_trait::ExtractorPhase;
use super::phases::{CompilePhase, ExtractPhase, InstallPhase, ParsePhase};
use crate::environment::HostEnvironment;
use crate::progress::ProgressEvent;
use crate::project::graph::ExtractionPhase;
use crate::session::ExtractorSession;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::{debug, info};

/// Runs extraction phases strictly in order over one context.
pub struct ExtractionPipeline {
    phases: Vec<Box<dyn ExtractorPhase>>,
}

impl ExtractionPipeline {
    pub fn new(phases: Vec<Box<dyn ExtractorPhase>>) -> Self {
        Self { phases }
    }

    /// Full CodeQL run: parse, install, compile, extract.
    pub fn autobuild(host: HostEnvironment) -> Self {
        Self::new(vec![
            Box::new(ParsePhase),
            Box::new(InstallPhase::new()),
            Box::new(CompilePhase::new()),
            Box::new(ExtractPhase::new(host)),
        ])
    }

    /// Parse, optionally install, then compile with command analysis.
    pub fn debug_compiler(skip_install: bool) -> Self {
        let mut phases: Vec<Box<dyn ExtractorPhase>> = vec![Box::new(ParsePhase)];
        if !skip_install {
            phases.push(Box::new(InstallPhase::new()));
        }
        phases.push(Box::new(CompilePhase::new().with_command_analysis()));
        Self::new(phases)
    }

    pub fn debug_parser() -> Self {
        Self::new(vec![Box::new(ParsePhase)])
    }

    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|p| p.name()).collect()
    }

    pub fn execute(&self, session: &ExtractorSession, context: &mut ExtractionContext) -> Result<()> {
        let start = Instant::now();
        info!(
            "Starting extraction pipeline for: {}",
            session.source_root().display()
        );
        session.emit(ProgressEvent::Started {
            source_root: session.source_root().display().to_string(),
        });

        let result = self.run_phases(session, context);
        context.graph.status_summary.performance.total_duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => {
                info!(
                    "Pipeline complete: {} project(s), {} task(s)",
                    context.graph.projects.len(),
                    context.graph.status_summary.total_compilation_tasks
                );
                session.emit(ProgressEvent::Completed {
                    success: context.graph.status_summary.overall_success,
                    total_time: start.elapsed(),
                });
            }
            Err(e) => {
                let message = format!("{:#}", e);
                context.graph.status_summary.overall_success = false;
                context.graph.current_phase = ExtractionPhase::Failed;
                session.emit(ProgressEvent::Failed { error: message });
            }
        }

        result
    }

    fn run_phases(&self, session: &ExtractorSession, context: &mut ExtractionContext) -> Result<()> {
        for phase in &self.phases {
            let phase_name = phase.name();
            info!("Phase: {}", phase_name);
            session.emit(ProgressEvent::PhaseStarted {
                phase: phase_name.to_string(),
            });

            let phase_start = Instant::now();
            phase
                .execute(context, session)
                .with_context(|| format!("Phase {} failed", phase_name))?;

            session.emit(ProgressEvent::PhaseComplete {
                phase: phase_name.to_string(),
                duration: phase_start.elapsed(),
            });
            debug!("Phase {} complete", phase_name);
        }
        Ok(())
    }
}
