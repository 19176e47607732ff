//! CDS compiler discovery, invocation and orchestration

pub mod command;
pub mod compile;
pub mod orchestrator;
pub mod report;
pub mod task;

pub use command::{
    CommandAnalysis, CommandProbe, CommandProbeCache, CommandProber, CommandResolver, ShellProber,
};
pub use compile::{CdsCompiler, CompileError, CompileOutcome};
pub use orchestrator::{CompilationOrchestrator, ProjectCommand};
pub use report::{generate_debug_report, generate_status_report, DebugDetails};
pub use task::{build_tasks, CompilationAttempt, CompilationTask, PlanError, TaskKind, TaskStatus};
