use super::context::ExtractionContext;
use crate::session::ExtractorSession;
use anyhow::Result;

/// One step of an extraction run. An `Err` aborts the run; contained failures are
/// recorded on the graph instead.
pub trait ExtractorPhase: Send + Sync {
    fn name(&self) -> &'static str;

    fn execute(&self, context: &mut ExtractionContext, session: &ExtractorSession) -> Result<()>;
}
