//! Source-root-relative path helpers
//!
//! Project directories and `.cds` files are keyed by forward-slash paths relative to the
//! source root, with `.` standing for the root itself.

use std::path::{Component, Path, PathBuf};

pub const ROOT_DIR: &str = ".";

/// Renders `path` relative to `root` using `/` separators; `.` for the root itself.
///
/// Returns `None` when `path` is not under `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let key = to_slash(rel);
    Some(if key.is_empty() {
        ROOT_DIR.to_string()
    } else {
        key
    })
}

pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Absolute location of a root-relative key
pub fn absolute(root: &Path, key: &str) -> PathBuf {
    if key == ROOT_DIR || key.is_empty() {
        root.to_path_buf()
    } else {
        root.join(key)
    }
}

/// Directory part of a root-relative file key (`.` for top-level files)
pub fn parent_key(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => ROOT_DIR,
    }
}

/// Joins `rel` onto the root-relative directory `dir` and folds `.`/`..` lexically.
///
/// Leading `..` segments that climb above the root are kept.
pub fn join_normalized(dir: &str, rel: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let base = if dir == ROOT_DIR { "" } else { dir };
    for segment in base.split('/').chain(rel.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), Some(last) if *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        ROOT_DIR.to_string()
    } else {
        parts.join("/")
    }
}

/// True when `child` lies strictly below the project directory `parent`.
pub fn is_strict_descendant(child: &str, parent: &str) -> bool {
    if parent == ROOT_DIR {
        return child != ROOT_DIR;
    }
    child.len() > parent.len() && child.starts_with(parent) && child[parent.len()..].starts_with('/')
}

/// Prefixes a project-relative path with the project directory.
pub fn in_project(project_dir: &str, rel: &str) -> String {
    if project_dir == ROOT_DIR {
        rel.to_string()
    } else if rel == ROOT_DIR {
        project_dir.to_string()
    } else {
        format!("{}/{}", project_dir, rel)
    }
}
