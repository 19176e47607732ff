use crate::environment::HostEnvironment;
use crate::pipeline::context::ExtractionContext;
use crate::pipeline::phase_trait::ExtractorPhase;
use crate::project::graph::ExtractionPhase;
use crate::session::ExtractorSession;
use anyhow::Result;
use std::time::Instant;

/// Runs the JavaScript extractor over the compiled output.
pub struct ExtractPhase {
    host: HostEnvironment,
}

impl ExtractPhase {
    pub fn new(host: HostEnvironment) -> Self {
        Self { host }
    }
}

impl ExtractorPhase for ExtractPhase {
    fn name(&self) -> &'static str {
        "ExtractPhase"
    }

    fn execute(&self, context: &mut ExtractionContext, session: &ExtractorSession) -> Result<()> {
        let graph = &mut context.graph;
        graph.current_phase = ExtractionPhase::Extracting;
        let start = Instant::now();

        let result = self
            .host
            .run_javascript_extractor(session.source_root(), session.diagnostics());

        if let Err(message) = &result {
            graph.record_critical(ExtractionPhase::Extracting, message.clone());
            graph.status_summary.overall_success = false;
        }

        graph.status_summary.performance.extraction_duration_ms = start.elapsed().as_millis() as u64;
        graph.current_phase = if graph.status_summary.overall_success {
            ExtractionPhase::Completed
        } else {
            ExtractionPhase::Failed
        };

        context.extractor_result = Some(result);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::diagnostics::RecordingDiagnostics;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn host(dir: &Path, exit_code: i32) -> HostEnvironment {
        let tools = dir.join("js/tools");
        fs::create_dir_all(&tools).unwrap();
        let script = tools.join("autobuild.sh");
        fs::write(&script, format!("#!/bin/sh\nexit {}\n", exit_code)).unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        HostEnvironment {
            codeql: PathBuf::from("/usr/bin/true"),
            javascript_root: dir.join("js"),
            autobuild_script: script,
        }
    }

    #[test]
    fn test_successful_extraction_completes_run() {
        let dir = TempDir::new().unwrap();
        let session = ExtractorSession::new(ExtractorConfig::default(), dir.path());
        let mut context = ExtractionContext::new(dir.path());
        context.graph.status_summary.overall_success = true;

        ExtractPhase::new(host(dir.path(), 0))
            .execute(&mut context, &session)
            .unwrap();

        assert!(!context.extractor_failed());
        assert_eq!(context.graph.current_phase, ExtractionPhase::Completed);
    }

    #[test]
    fn test_failed_extraction_is_recorded() {
        let dir = TempDir::new().unwrap();
        let session = ExtractorSession::new(ExtractorConfig::default(), dir.path())
            .with_diagnostics(Box::new(RecordingDiagnostics::new()));
        let mut context = ExtractionContext::new(dir.path());
        context.graph.status_summary.overall_success = true;

        ExtractPhase::new(host(dir.path(), 3))
            .execute(&mut context, &session)
            .unwrap();

        assert!(context.extractor_failed());
        assert_eq!(context.graph.current_phase, ExtractionPhase::Failed);
        assert_eq!(
            context.graph.status_summary.critical_errors,
            vec!["JavaScript extractor failed with exit code 3".to_string()]
        );
    }
}
