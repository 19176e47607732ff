//! Filesystem walking shared by detection and graph building

use ignore::{overrides::Override, overrides::OverrideBuilder, WalkBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directories never searched for projects or sources
const EXCLUDED_DIRS: &[&str] = &["node_modules", "*.testproj"];

pub const CDS_EXTENSION: &str = "cds";
pub const PACKAGE_JSON: &str = "package.json";

fn overrides(root: &Path) -> Override {
    let mut builder = OverrideBuilder::new(root);
    for excluded in EXCLUDED_DIRS {
        if let Err(e) = builder.add(&format!("!{}/", excluded)) {
            warn!(pattern = excluded, error = %e, "Invalid exclude pattern");
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build exclude overrides, walking without them");
        Override::empty()
    })
}

/// Recursively lists files under `root` accepted by `keep`, sorted.
///
/// Hidden entries are skipped and VCS ignore files are not consulted.
pub fn find_files<F>(root: &Path, keep: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut files = Vec::new();

    for result in WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(true)
        .overrides(overrides(root))
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
    {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "Failed to read directory entry");
                continue;
            }
        };

        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) && keep(entry.path()) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    files
}

pub fn is_cds_file(path: &Path) -> bool {
    path.extension().map(|e| e == CDS_EXTENSION).unwrap_or(false)
}

pub fn find_cds_files(root: &Path) -> Vec<PathBuf> {
    find_files(root, is_cds_file)
}

pub fn find_package_manifests(root: &Path) -> Vec<PathBuf> {
    find_files(root, |p| {
        p.file_name().map(|n| n == PACKAGE_JSON).unwrap_or(false)
    })
}

/// True when `dir` directly contains a visible `.cds` file.
pub fn has_direct_cds_files(dir: &Path) -> bool {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return false,
    };

    entries.filter_map(Result::ok).any(|entry| {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        !hidden && path.is_file() && is_cds_file(&path)
    })
}

/// True when `path` names a directory that would be excluded from walking.
pub fn is_excluded_location(path: &Path) -> bool {
    let text = path.to_string_lossy();
    text.contains("node_modules") || text.contains(".testproj")
}
