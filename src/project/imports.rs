//! `using ... from '...'` import extraction
//!
//! This is a narrow text matcher, not a CDS parser. It recognizes only the
//! `using <names> from '<literal>';` surface form, where `<names>` is either a
//! brace list or a dotted name with an optional `as` alias, and the literal may use
//! single, double or backtick quotes. Anything else, including unterminated or
//! malformed statements, is silently skipped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

use super::paths::{join_normalized, parent_key};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File does not exist: {0}")]
    FileNotFound(PathBuf),
    #[error("Failed to read file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

/// One `using` statement found in a `.cds` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReference {
    pub statement: String,
    pub path: String,
    pub is_relative: bool,
    pub is_module: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<String>,
}

impl ImportReference {
    fn new(statement: &str, path: &str) -> Self {
        let is_relative = path.starts_with("./") || path.starts_with("../");
        Self {
            statement: statement.to_string(),
            path: path.to_string(),
            is_relative,
            is_module: !is_relative && !path.starts_with('/'),
            resolved_path: None,
        }
    }

    /// Resolves a relative import against the importing file's root-relative path.
    ///
    /// The `.cds` extension is appended when missing. Imports that climb above the
    /// source root are left unresolved.
    pub fn resolve_against(&mut self, importing_file: &str) -> Option<&str> {
        if !self.is_relative {
            return None;
        }
        let mut target = join_normalized(parent_key(importing_file), &self.path);
        if !target.ends_with(".cds") {
            target.push_str(".cds");
        }
        if target.starts_with("../") {
            return None;
        }
        self.resolved_path = Some(target);
        self.resolved_path.as_deref()
    }
}

fn using_regex() -> &'static Regex {
    static USING: OnceLock<Regex> = OnceLock::new();
    USING.get_or_init(|| {
        Regex::new(
            r#"using\s+(?:\{[^}]+\}|[\w.]+(?:\s+as\s+[\w.]+)?)\s+from\s+['"`]([^'"`]+)['"`]\s*;"#,
        )
        .expect("valid regex")
    })
}

/// Extracts every `using ... from '...'` reference from CDS source text, in order.
pub fn extract_imports(content: &str) -> Vec<ImportReference> {
    using_regex()
        .captures_iter(content)
        .filter_map(|caps| {
            let statement = caps.get(0)?.as_str();
            let path = caps.get(1)?.as_str();
            Some(ImportReference::new(statement, path))
        })
        .collect()
}

/// Reads `path` and extracts its imports.
///
/// # Errors
///
/// A missing file is reported as `ImportError::FileNotFound`; callers are expected to
/// pass only paths they discovered on disk.
pub fn extract_imports_from_file(path: &Path) -> Result<Vec<ImportReference>, ImportError> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|source| ImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(extract_imports(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_brace_list_import() {
        let imports = extract_imports("using { Books, Authors } from '../db/schema';");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].path, "../db/schema");
        assert!(imports[0].is_relative);
        assert!(!imports[0].is_module);
    }

    #[test]
    fn test_dotted_name_with_alias_and_quotes() {
        let content = r#"
            using sap.common as common from "@sap/cds/common";
            using my.bookshop from `./schema`;
        "#;
        let imports = extract_imports(content);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].path, "@sap/cds/common");
        assert!(imports[0].is_module);
        assert_eq!(imports[1].path, "./schema");
        assert!(imports[1].is_relative);
    }

    #[test]
    fn test_multiline_brace_list() {
        let content = "using {\n  Books,\n  Authors\n}\nfrom\n'./db'\n;";
        let imports = extract_imports(content);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].path, "./db");
    }

    #[test]
    fn test_absolute_path_is_neither_relative_nor_module() {
        let imports = extract_imports("using { X } from '/abs/model';");
        assert!(!imports[0].is_relative);
        assert!(!imports[0].is_module);
    }

    #[test]
    fn test_malformed_statements_are_skipped() {
        let content = "using { Books from '../db/schema';\nusing X from 'unterminated\nusing Y;";
        assert!(extract_imports(content).is_empty());
    }

    #[test]
    fn test_resolve_against_appends_extension() {
        let mut import = ImportReference::new("using", "../db/schema");
        assert_eq!(import.resolve_against("srv/service.cds"), Some("db/schema.cds"));

        let mut import = ImportReference::new("using", "./types.cds");
        assert_eq!(import.resolve_against("model.cds"), Some("types.cds"));

        let mut import = ImportReference::new("using", "@sap/cds/common");
        assert_eq!(import.resolve_against("model.cds"), None);
        assert!(import.resolved_path.is_none());
    }

    #[test]
    fn test_resolve_outside_root_is_unresolved() {
        let mut import = ImportReference::new("using", "../../shared/model");
        assert_eq!(import.resolve_against("srv/service.cds"), None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = extract_imports_from_file(&dir.path().join("missing.cds"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_extract_from_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("service.cds");
        fs::write(&file, "using { A } from './a';\nservice S {}").unwrap();
        let imports = extract_imports_from_file(&file).unwrap();
        assert_eq!(imports.len(), 1);
    }
}
