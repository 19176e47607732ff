//! CDS project discovery
//!
//! Walks a source tree and decides which directories are independent CAP projects.
//! Candidates come from two places: every directory holding a `package.json`, and the
//! project root inferred for every directory holding a `.cds` file. Candidates that
//! do not look like CDS projects are dropped, and nested candidates are collapsed
//! into their ancestor unless the ancestor is a workspace root with its own sources.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::manifest::PackageJson;
use super::paths::{absolute, is_strict_descendant, relative_key};
use super::walk;

/// Standard CAP source folders
pub const STANDARD_DIRS: [&str; 3] = ["db", "srv", "app"];

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Source root directory '{0}' does not exist")]
    SourceRootNotFound(PathBuf),
    #[error("Source root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Failed to resolve source root {path}: {source}")]
    Canonicalize { path: PathBuf, source: io::Error },
}

pub struct ProjectDetector {
    source_root: PathBuf,
}

impl ProjectDetector {
    pub fn new(source_root: &Path) -> Result<Self, DetectionError> {
        if !source_root.exists() {
            return Err(DetectionError::SourceRootNotFound(source_root.to_path_buf()));
        }
        if !source_root.is_dir() {
            return Err(DetectionError::NotADirectory(source_root.to_path_buf()));
        }
        let source_root = source_root
            .canonicalize()
            .map_err(|source| DetectionError::Canonicalize {
                path: source_root.to_path_buf(),
                source,
            })?;

        debug!(source_root = %source_root.display(), "ProjectDetector initialized");
        Ok(Self { source_root })
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Returns the sorted, root-relative directories of every detected project.
    pub fn detect(&self) -> Vec<String> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |dir: PathBuf| {
            if seen.insert(dir.clone()) {
                candidates.push(dir);
            }
        };

        for manifest in walk::find_package_manifests(&self.source_root) {
            if let Some(dir) = manifest.parent() {
                push(dir.to_path_buf());
            }
        }

        for cds_file in walk::find_cds_files(&self.source_root) {
            if let Some(dir) = cds_file.parent() {
                push(self.find_project_root(dir));
            }
        }

        debug!(candidates = candidates.len(), "Collected project candidates");

        let mut found: Vec<String> = Vec::new();
        for dir in candidates {
            if !self.is_likely_cds_project(&dir) {
                continue;
            }
            let Some(key) = relative_key(&self.source_root, &dir) else {
                continue;
            };

            let mut should_add = true;
            for existing in found.clone() {
                let existing_dir = absolute(&self.source_root, &existing);

                if is_strict_descendant(&key, &existing) {
                    // Children of a workspace root with its own sources stand alone.
                    should_add = is_workspace_root(&existing_dir)
                        && (has_standard_cds_content(&existing_dir)
                            || walk::has_direct_cds_files(&existing_dir));
                    break;
                }

                if is_strict_descendant(&existing, &key)
                    && !(is_workspace_root(&dir) && self.is_likely_cds_project(&existing_dir))
                {
                    debug!(parent = %key, child = %existing, "Collapsing nested project");
                    found.retain(|p| p != &existing);
                }
            }

            if should_add {
                found.push(key);
            }
        }

        found.sort();
        info!(
            source_root = %self.source_root.display(),
            projects = found.len(),
            "Detected CDS projects"
        );
        found
    }

    /// A directory looks like a CDS project when it has `.cds` sources directly or
    /// anywhere under `db/`, `srv/` or `app/`.
    ///
    /// A manifest declaring CAP dependencies does not make up for missing sources, and a
    /// manifest without them does not disqualify a directory that has sources.
    pub fn is_likely_cds_project(&self, dir: &Path) -> bool {
        match relative_key(&self.source_root, dir) {
            Some(key) if !walk::is_excluded_location(Path::new(&key)) => {}
            _ => return false,
        }

        let has_cds_files = has_standard_cds_content(dir) || walk::has_direct_cds_files(dir);
        if !has_cds_files {
            if let Some(manifest) = PackageJson::read_optional(dir) {
                if manifest.has_cap_dependency() {
                    debug!(dir = %dir.display(), "CAP dependencies declared but no CDS sources");
                }
            }
        }
        has_cds_files
    }

    /// Walks upward from a `.cds` file's directory to the directory that owns it.
    ///
    /// Precedence per level: a qualifying standard subfolder (`db`/`srv`/`app`) yields to
    /// a qualifying parent; otherwise a parent with a CAP layout wins; otherwise the
    /// qualifying directory itself. A non-qualifying directory with a CAP layout is
    /// returned as is. Without any of these the original directory is kept.
    pub fn find_project_root(&self, cds_dir: &Path) -> PathBuf {
        let mut current = cds_dir.to_path_buf();

        while current.starts_with(&self.source_root) {
            if self.is_likely_cds_project(&current) {
                let parent = current.parent().filter(|p| self.is_searchable(p));

                if is_standard_dir(&current) {
                    if let Some(parent) = parent {
                        if self.is_likely_cds_project(parent) {
                            return parent.to_path_buf();
                        }
                    }
                }

                if let Some(parent) = parent {
                    if has_cap_layout(parent) {
                        return parent.to_path_buf();
                    }
                }

                return current;
            }

            if has_cap_layout(&current) {
                return current;
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }

        cds_dir.to_path_buf()
    }

    fn is_searchable(&self, dir: &Path) -> bool {
        match relative_key(&self.source_root, dir) {
            Some(key) => !walk::is_excluded_location(Path::new(&key)),
            None => false,
        }
    }
}

fn is_standard_dir(dir: &Path) -> bool {
    dir.file_name()
        .map(|name| STANDARD_DIRS.iter().any(|s| name == *s))
        .unwrap_or(false)
}

fn is_workspace_root(dir: &Path) -> bool {
    PackageJson::read_optional(dir)
        .map(|m| m.is_workspace_root())
        .unwrap_or(false)
}

/// `db`+`srv` or `srv`+`app` subdirectories
pub fn has_cap_layout(dir: &Path) -> bool {
    let has = |name: &str| dir.join(name).is_dir();
    let srv = has("srv");
    srv && (has("db") || has("app"))
}

/// Any `.cds` file at any depth under `db/`, `srv/` or `app/`
pub fn has_standard_cds_content(dir: &Path) -> bool {
    STANDARD_DIRS.iter().any(|name| {
        let location = dir.join(name);
        match fs::metadata(&location) {
            Ok(meta) if meta.is_dir() => !walk::find_cds_files(&location).is_empty(),
            _ => false,
        }
    })
}
