//! Phase-ordered extraction runs

pub mod context;
pub mod orchestrator;
pub mod phase_trait;
pub mod phases;

pub use context::ExtractionContext;
pub use orchestrator::ExtractionPipeline;
pub use phase_trait::ExtractorPhase;
