//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, error, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { source_root } => {
                info!(source_root = %source_root, "Starting CDS extraction");
            }
            ProgressEvent::PhaseStarted { phase } => {
                info!(phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete { phase, duration } => {
                info!(
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::TaskComplete {
                task_id,
                project_dir,
                success,
                duration,
            } => {
                if *success {
                    debug!(
                        task = %task_id,
                        project = %project_dir,
                        duration_ms = duration.as_millis(),
                        "Compilation task succeeded"
                    );
                } else {
                    warn!(
                        task = %task_id,
                        project = %project_dir,
                        duration_ms = duration.as_millis(),
                        "Compilation task failed"
                    );
                }
            }
            ProgressEvent::Completed {
                success,
                total_time,
            } => {
                info!(
                    success,
                    total_time_ms = total_time.as_millis(),
                    "CDS extraction complete"
                );
            }
            ProgressEvent::Failed { error: message } => {
                error!(error = %message, "CDS extraction failed");
            }
        }
    }
}
