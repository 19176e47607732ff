// Extraction phases, in run order: parse the source tree into a dependency graph,
// install the CDS toolchain per version combination, compile, then hand the
// generated .cds.json files to the JavaScript extractor.

pub mod compile;
pub mod extract;
pub mod install;
pub mod parse;

pub use compile::CompilePhase;
pub use extract::ExtractPhase;
pub use install::InstallPhase;
pub use parse::ParsePhase;
