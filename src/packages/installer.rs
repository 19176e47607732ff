//! Installation of `@sap/cds` / `@sap/cds-dk` into per-version cache directories
//!
//! Projects requesting the same resolved pair share one `cds-<hash>` directory under
//! the cache root. A failed combination only affects the projects that need it.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::resolver::{resolve_cds_versions, VersionResolution};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::project::graph::{DependencyGraph, ExtractionPhase, ProjectStatus};
use crate::project::manifest::{CDS_DK_PACKAGE, CDS_PACKAGE};
use crate::project::paths::{absolute, in_project};
use crate::project::walk::PACKAGE_JSON;
use crate::session::ExtractorSession;

/// Lowercase hex SHA-256 of `"<cds>|<cds-dk>"`
pub fn combination_hash(cds_version: &str, cds_dk_version: &str) -> String {
    hex::encode(Sha256::digest(format!("{}|{}", cds_version, cds_dk_version)))
}

/// Both packages are present under `<dir>/node_modules`.
pub fn is_installed(dir: &Path) -> bool {
    let node_modules = dir.join("node_modules");
    node_modules.join(CDS_PACKAGE).is_dir() && node_modules.join(CDS_DK_PACKAGE).is_dir()
}

/// What one project asked for and what it resolved to
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    pub project_dir: String,
    pub requested_cds_version: String,
    pub requested_cds_dk_version: String,
    pub resolution: VersionResolution,
}

/// One distinct resolved version pair and the projects that need it.
///
/// The top-level request and resolution are those of the first project; fallback
/// handling always looks at each project's own [`ProjectRequest`].
#[derive(Debug, Clone)]
pub struct VersionCombination {
    pub requested_cds_version: String,
    pub requested_cds_dk_version: String,
    pub resolution: VersionResolution,
    pub hash: String,
    pub projects: Vec<ProjectRequest>,
}

impl VersionCombination {
    pub fn project_dirs(&self) -> Vec<&str> {
        self.projects.iter().map(|p| p.project_dir.as_str()).collect()
    }

    /// Some project in this combination could not get the versions it asked for.
    pub fn has_fallback(&self) -> bool {
        self.projects.iter().any(|p| p.resolution.is_fallback)
    }

    pub fn effective_cds_version(&self) -> &str {
        self.resolution
            .resolved_cds_version
            .as_deref()
            .unwrap_or(&self.requested_cds_version)
    }

    pub fn effective_cds_dk_version(&self) -> &str {
        self.resolution
            .resolved_cds_dk_version
            .as_deref()
            .unwrap_or(&self.requested_cds_dk_version)
    }

    pub fn dir_name(&self) -> String {
        format!("cds-{}", self.hash)
    }

    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }

    /// Generated `package.json` for the cache directory
    pub fn manifest(&self) -> serde_json::Value {
        json!({
            "name": format!("cds-extractor-cache-{}", self.hash),
            "version": "1.0.0",
            "private": true,
            "dependencies": {
                CDS_PACKAGE: self.effective_cds_version(),
                CDS_DK_PACKAGE: self.effective_cds_dk_version(),
            }
        })
    }

    fn is_resolved(&self) -> bool {
        self.resolution.resolved_cds_version.is_some()
            && self.resolution.resolved_cds_dk_version.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallSummary {
    pub combinations: usize,
    pub installed: usize,
    pub failed: usize,
    /// Project directory to the cache directory it compiles against
    pub project_cache_dirs: BTreeMap<String, PathBuf>,
}

/// Performs the actual package install in a prepared cache directory.
pub trait InstallRunner: Send + Sync {
    fn install(&self, dir: &Path) -> Result<()>;
}

impl<R: InstallRunner + ?Sized> InstallRunner for Arc<R> {
    fn install(&self, dir: &Path) -> Result<()> {
        (**self).install(dir)
    }
}

/// `npm install --quiet --no-audit --no-fund`, run to completion
#[derive(Debug, Default, Clone, Copy)]
pub struct NpmInstall;

impl InstallRunner for NpmInstall {
    fn install(&self, dir: &Path) -> Result<()> {
        let status = Command::new("npm")
            .args(["install", "--quiet", "--no-audit", "--no-fund"])
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .context("Failed to run npm install")?;

        if !status.success() {
            bail!("npm install exited with {}", status);
        }
        Ok(())
    }
}

pub struct DependencyInstaller<'a> {
    session: &'a ExtractorSession,
    runner: Box<dyn InstallRunner>,
}

impl<'a> DependencyInstaller<'a> {
    pub fn new(session: &'a ExtractorSession) -> Self {
        Self {
            session,
            runner: Box::new(NpmInstall),
        }
    }

    pub fn with_runner(mut self, runner: Box<dyn InstallRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Distinct resolved pairs over every project with a manifest, in project order.
    pub fn collect_combinations(&self, graph: &DependencyGraph) -> Vec<VersionCombination> {
        let mut combinations: Vec<VersionCombination> = Vec::new();

        for project in graph.projects.values() {
            let Some(manifest) = &project.package_json else {
                continue;
            };
            let cds = manifest.requested_cds_version();
            let cds_dk = manifest.requested_cds_dk_version();
            let resolution = resolve_cds_versions(self.session.versions(), &cds, &cds_dk);

            if let Some(warning) = &resolution.warning {
                warn!(project = %project.project_dir, warning = %warning, "Version resolution warning");
            }

            let hash = combination_hash(
                resolution.resolved_cds_version.as_deref().unwrap_or(&cds),
                resolution.resolved_cds_dk_version.as_deref().unwrap_or(&cds_dk),
            );
            let request = ProjectRequest {
                project_dir: project.project_dir.clone(),
                requested_cds_version: cds.clone(),
                requested_cds_dk_version: cds_dk.clone(),
                resolution: resolution.clone(),
            };

            if let Some(existing) = combinations.iter_mut().find(|c| c.hash == hash) {
                existing.projects.push(request);
                continue;
            }

            combinations.push(VersionCombination {
                requested_cds_version: cds,
                requested_cds_dk_version: cds_dk,
                resolution,
                hash,
                projects: vec![request],
            });
        }

        combinations
    }

    /// Installs every combination and maps projects onto their cache directories.
    pub fn install(&self, graph: &mut DependencyGraph) -> InstallSummary {
        let mut summary = InstallSummary::default();
        if graph.is_empty() {
            return summary;
        }

        let combinations = self.collect_combinations(graph);
        summary.combinations = combinations.len();
        if combinations.is_empty() {
            error!("No CDS dependencies found in any project; compilation will rely on globally available tooling");
            return summary;
        }

        for combination in &combinations {
            let suffix = if combination.has_fallback() {
                " (using fallback versions)"
            } else {
                ""
            };
            info!(
                "Dependency combination {}: {}@{}, {}@{}{}",
                combination.short_hash(),
                CDS_PACKAGE,
                combination.effective_cds_version(),
                CDS_DK_PACKAGE,
                combination.effective_cds_dk_version(),
                suffix
            );
        }

        let cache_root = self.session.cache_root();
        if let Err(e) = fs::create_dir_all(&cache_root) {
            warn!(cache_root = %cache_root.display(), error = %e, "Failed to create cache directory");
            return summary;
        }

        for combination in &combinations {
            let dir = cache_root.join(combination.dir_name());
            match self.install_combination(combination, &dir) {
                Ok(()) => {
                    summary.installed += 1;
                    self.map_projects(graph, combination, &dir, &mut summary);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        combination = combination.short_hash(),
                        error = %format!("{:#}", e),
                        "Failed to install CDS dependencies"
                    );
                }
            }
        }

        if summary.installed == 0 {
            error!(failed = summary.failed, "All dependency installations failed");
        } else if summary.failed > 0 {
            warn!(
                installed = summary.installed,
                failed = summary.failed,
                "Some dependency installations failed"
            );
        } else {
            info!(installed = summary.installed, "All dependency combinations installed");
        }
        for (project, dir) in &summary.project_cache_dirs {
            debug!(project = %project, cache_dir = %dir.display(), "Project cache mapping");
        }

        summary
    }

    fn install_combination(&self, combination: &VersionCombination, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let manifest_path = dir.join(PACKAGE_JSON);
        if !manifest_path.exists() {
            let content = serde_json::to_string_pretty(&combination.manifest())?;
            fs::write(&manifest_path, content)
                .with_context(|| format!("Failed to write {}", manifest_path.display()))?;
        }

        if is_installed(dir) {
            info!(cache_dir = %dir.display(), "CDS dependencies already installed");
            return Ok(());
        }

        if !combination.is_resolved() {
            bail!(
                "No published versions found for {}@{} / {}@{}",
                CDS_PACKAGE,
                combination.requested_cds_version,
                CDS_DK_PACKAGE,
                combination.requested_cds_dk_version
            );
        }

        info!(cache_dir = %dir.display(), "Installing CDS dependencies");
        self.runner.install(dir)
    }

    fn map_projects(
        &self,
        graph: &mut DependencyGraph,
        combination: &VersionCombination,
        dir: &Path,
        summary: &mut InstallSummary,
    ) {
        for request in &combination.projects {
            let project_dir = &request.project_dir;
            summary
                .project_cache_dirs
                .insert(project_dir.clone(), dir.to_path_buf());

            if let Some(project) = graph.projects.get_mut(project_dir) {
                project.status = ProjectStatus::DependenciesResolved;
                project.timestamps.dependencies_resolved = Some(Utc::now());
            }

            if request.resolution.is_fallback {
                let message = fallback_message(request, combination);
                warn!(project = %project_dir, "{}", message);
                let manifest = absolute(
                    self.session.source_root(),
                    &in_project(project_dir, PACKAGE_JSON),
                );
                self.session.report(&Diagnostic::new(
                    DiagnosticKind::DependencyVersionFallback,
                    manifest,
                    message.clone(),
                ));
                graph.record_warning(ExtractionPhase::DependencyResolution, message);
            }
        }
    }
}

fn fallback_message(request: &ProjectRequest, combination: &VersionCombination) -> String {
    let mut message = format!(
        "Project '{}' requested {}@{} and {}@{}, which could not be satisfied; using {}@{} and {}@{} instead.",
        request.project_dir,
        CDS_PACKAGE,
        request.requested_cds_version,
        CDS_DK_PACKAGE,
        request.requested_cds_dk_version,
        CDS_PACKAGE,
        combination.effective_cds_version(),
        CDS_DK_PACKAGE,
        combination.effective_cds_dk_version(),
    );
    if let Some(warning) = &request.resolution.warning {
        message.push(' ');
        message.push_str(warning);
    }
    message
}
