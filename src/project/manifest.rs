//! `package.json` parsing

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::warn;

pub const CDS_PACKAGE: &str = "@sap/cds";
pub const CDS_DK_PACKAGE: &str = "@sap/cds-dk";
pub const LATEST: &str = "latest";

/// `workspaces` may be a plain list or a `{ "packages": [...] }` object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    List(Vec<String>),
    Config {
        #[serde(default)]
        packages: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Workspaces>,
}

impl PackageJson {
    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse package.json")
    }

    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid manifest {}", path.display()))
    }

    /// Reads `<dir>/package.json`; absent or unreadable manifests yield `None`.
    pub fn read_optional(dir: &Path) -> Option<Self> {
        let path = dir.join("package.json");
        if !path.is_file() {
            return None;
        }
        match Self::read(&path) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable package.json");
                None
            }
        }
    }

    /// Declares `@sap/cds` or `@sap/cds-dk` in dependencies or devDependencies.
    pub fn has_cap_dependency(&self) -> bool {
        [CDS_PACKAGE, CDS_DK_PACKAGE].iter().any(|pkg| {
            self.dependencies.contains_key(*pkg) || self.dev_dependencies.contains_key(*pkg)
        })
    }

    /// A monorepo root declares a non-empty `workspaces` list.
    pub fn is_workspace_root(&self) -> bool {
        matches!(&self.workspaces, Some(Workspaces::List(list)) if !list.is_empty())
    }

    /// Requested `@sap/cds` range, `latest` when undeclared.
    pub fn requested_cds_version(&self) -> String {
        self.dependencies
            .get(CDS_PACKAGE)
            .cloned()
            .unwrap_or_else(|| LATEST.to_string())
    }

    /// Requested `@sap/cds-dk` range, falling back to the `@sap/cds` request.
    pub fn requested_cds_dk_version(&self) -> String {
        self.dev_dependencies
            .get(CDS_DK_PACKAGE)
            .or_else(|| self.dependencies.get(CDS_DK_PACKAGE))
            .cloned()
            .unwrap_or_else(|| self.requested_cds_version())
    }

    /// True when the package behind a `using ... from '<module>/...'` import is declared.
    pub fn declares_module(&self, import_path: &str) -> bool {
        let mut parts = import_path.split('/');
        let first = parts.next().unwrap_or_default();
        let module = if first.starts_with('@') {
            match parts.next() {
                Some(second) => format!("{}/{}", first, second),
                None => first.to_string(),
            }
        } else {
            first.to_string()
        };
        self.dependencies.contains_key(&module) || self.dev_dependencies.contains_key(&module)
    }
}
