use crate::packages::installer::{DependencyInstaller, InstallRunner, NpmInstall};
use crate::pipeline::context::ExtractionContext;
use crate::pipeline::phase_trait::ExtractorPhase;
use crate::project::graph::ExtractionPhase;
use crate::session::ExtractorSession;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Installs one CDS toolchain per version combination and maps projects onto the
/// resulting cache directories. Projects left without a cache compile with the global
/// `cds`/`npx` strategies.
pub struct InstallPhase {
    runner: Arc<dyn InstallRunner>,
}

impl Default for InstallPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallPhase {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(NpmInstall),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn InstallRunner>) -> Self {
        self.runner = runner;
        self
    }
}

impl ExtractorPhase for InstallPhase {
    fn name(&self) -> &'static str {
        "InstallPhase"
    }

    fn execute(&self, context: &mut ExtractionContext, session: &ExtractorSession) -> Result<()> {
        context.graph.current_phase = ExtractionPhase::DependencyResolution;

        if session.config().skip_install {
            info!("Skipping CDS dependency installation");
            return Ok(());
        }

        let installer =
            DependencyInstaller::new(session).with_runner(Box::new(self.runner.clone()));
        let summary = installer.install(&mut context.graph);
        context.cache_dirs = summary.project_cache_dirs.clone();

        if context.cache_dirs.is_empty() && !context.graph.is_empty() {
            warn!(
                projects = context.graph.projects.len(),
                "No project has installed CDS dependencies; falling back to global tooling"
            );
        }

        context.install_summary = Some(summary);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;
    use crate::packages::registry::StaticVersions;
    use crate::project::graph::DependencyGraphBuilder;
    use anyhow::bail;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct FakeInstall;

    impl InstallRunner for FakeInstall {
        fn install(&self, dir: &Path) -> Result<()> {
            fs::create_dir_all(dir.join("node_modules/@sap/cds"))?;
            fs::create_dir_all(dir.join("node_modules/@sap/cds-dk"))?;
            Ok(())
        }
    }

    struct BrokenInstall;

    impl InstallRunner for BrokenInstall {
        fn install(&self, _dir: &Path) -> Result<()> {
            bail!("registry unreachable")
        }
    }

    fn setup(skip_install: bool) -> (TempDir, ExtractorSession, ExtractionContext) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("shop/srv")).unwrap();
        fs::write(
            root.join("shop/package.json"),
            r#"{"dependencies": {"@sap/cds": "^8.0.0"}}"#,
        )
        .unwrap();
        fs::write(root.join("shop/srv/service.cds"), "service Shop {}").unwrap();

        let config = ExtractorConfig {
            skip_install,
            ..ExtractorConfig::default()
        };
        let session = ExtractorSession::new(config, root).with_version_source(Arc::new(
            StaticVersions::new()
                .with("@sap/cds", &["8.2.0"])
                .with("@sap/cds-dk", &["8.2.0"]),
        ));
        let mut context = ExtractionContext::new(root);
        context.graph = DependencyGraphBuilder::new(root).unwrap().build();
        (temp_dir, session, context)
    }

    #[test]
    fn test_install_maps_cache_dirs() {
        let (_dir, session, mut context) = setup(false);
        InstallPhase::new()
            .with_runner(Arc::new(FakeInstall))
            .execute(&mut context, &session)
            .unwrap();

        assert!(context.cache_dirs.contains_key("shop"));
        assert_eq!(context.install_summary.unwrap().installed, 1);
    }

    #[test]
    fn test_missing_mappings_fall_back_to_global_tooling() {
        let (_dir, session, mut context) = setup(false);
        InstallPhase::new()
            .with_runner(Arc::new(BrokenInstall))
            .execute(&mut context, &session)
            .unwrap();

        assert!(context.cache_dirs.is_empty());
        assert_eq!(context.install_summary.unwrap().failed, 1);
    }

    #[test]
    fn test_project_without_manifest_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("model")).unwrap();
        fs::write(root.join("model/schema.cds"), "entity Books { key ID : Integer; }").unwrap();

        let session = ExtractorSession::new(ExtractorConfig::default(), root);
        let mut context = ExtractionContext::new(root);
        context.graph = DependencyGraphBuilder::new(root).unwrap().build();
        assert!(!context.graph.is_empty());

        InstallPhase::new()
            .with_runner(Arc::new(BrokenInstall))
            .execute(&mut context, &session)
            .unwrap();

        assert!(context.cache_dirs.is_empty());
        assert!(context.install_summary.is_some());
    }

    #[test]
    fn test_skip_install() {
        let (_dir, session, mut context) = setup(true);
        InstallPhase::new()
            .with_runner(Arc::new(BrokenInstall))
            .execute(&mut context, &session)
            .unwrap();

        assert!(context.install_summary.is_none());
        assert_eq!(context.graph.current_phase, ExtractionPhase::DependencyResolution);
    }
}
