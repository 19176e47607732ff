//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while an extraction run progresses
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    Started { source_root: String },

    /// Pipeline phase started
    PhaseStarted { phase: String },

    /// Pipeline phase finished
    PhaseComplete { phase: String, duration: Duration },

    /// One compilation task reached a terminal state
    TaskComplete {
        task_id: String,
        project_dir: String,
        success: bool,
        duration: Duration,
    },

    /// Run completed
    Completed { success: bool, total_time: Duration },

    /// Run aborted
    Failed { error: String },
}

/// Trait for handling progress events during a run
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
