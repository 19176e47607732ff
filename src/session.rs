//! Per-run state shared by every phase
//!
//! The session owns the memoized lookups (published versions, compiler probes), the
//! diagnostics sink and the progress handler. It is created once per run and passed
//! by reference; nothing here is process-global.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::compiler::command::{CommandProbeCache, CommandProber, ShellProber};
use crate::config::ExtractorConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink, NullDiagnostics};
use crate::packages::registry::{NpmRegistry, VersionCache, VersionSource};
use crate::progress::{LoggingHandler, ProgressEvent, ProgressHandler};

pub struct ExtractorSession {
    id: String,
    config: ExtractorConfig,
    source_root: PathBuf,
    versions: VersionCache,
    commands: CommandProbeCache,
    diagnostics: Box<dyn DiagnosticSink>,
    progress: Arc<dyn ProgressHandler>,
}

impl ExtractorSession {
    /// Production session: npm registry lookups, shell probes, no diagnostics sink.
    pub fn new(config: ExtractorConfig, source_root: &Path) -> Self {
        let versions = VersionCache::new(Arc::new(NpmRegistry::new(
            source_root,
            config.registry_timeout(),
        )));
        let commands = CommandProbeCache::new(Arc::new(ShellProber::new(config.probe_timeout())));

        Self {
            id: Uuid::new_v4().to_string(),
            config,
            source_root: source_root.to_path_buf(),
            versions,
            commands,
            diagnostics: Box::new(NullDiagnostics),
            progress: Arc::new(LoggingHandler),
        }
    }

    pub fn with_version_source(mut self, source: Arc<dyn VersionSource>) -> Self {
        self.versions = VersionCache::new(source);
        self
    }

    pub fn with_command_prober(mut self, prober: Arc<dyn CommandProber>) -> Self {
        self.commands = CommandProbeCache::new(prober);
        self
    }

    pub fn with_diagnostics(mut self, sink: Box<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = handler;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// `<source_root>/<cache_dir_name>`
    pub fn cache_root(&self) -> PathBuf {
        self.source_root.join(&self.config.cache_dir_name)
    }

    pub fn versions(&self) -> &VersionCache {
        &self.versions
    }

    pub fn commands(&self) -> &CommandProbeCache {
        &self.commands
    }

    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.diagnostics.as_ref()
    }

    pub fn report(&self, diagnostic: &Diagnostic) -> bool {
        self.diagnostics.add(diagnostic)
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }
}
