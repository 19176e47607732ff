//! CodeQL host environment: executable lookup, JavaScript extractor hand-off and
//! index filters

use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::util::run_captured;

pub const CODEQL_DIST_ENV: &str = "CODEQL_DIST";
pub const JAVASCRIPT_ROOT_ENV: &str = "CODEQL_EXTRACTOR_JAVASCRIPT_ROOT";
pub const INDEX_FILTERS_ENV: &str = "LGTM_INDEX_FILTERS";

/// Suffixes mirrored from `CODEQL_EXTRACTOR_CDS_*` to `CODEQL_EXTRACTOR_JAVASCRIPT_*`
const MIRRORED_SUFFIXES: [&str; 6] = [
    "WIP_DATABASE",
    "DIAGNOSTIC_DIR",
    "LOG_DIR",
    "SCRATCH_DIR",
    "TRAP_DIR",
    "SOURCE_ARCHIVE_DIR",
];

const BASE_INDEX_FILTERS: [&str; 4] = [
    "exclude:**/*.*",
    "include:**/*.cds.json",
    "include:**/*.cds",
    "exclude:**/node_modules/**/*.*",
];

/// Pre-existing exclude lines containing these are dropped
const CATCH_ALL_EXCLUDES: [&str; 2] = ["exclude:**/*", "exclude:**/*.*"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvironmentError {
    #[error("CodeQL executable not found (set CODEQL_DIST or put codeql on PATH)")]
    CodeqlNotFound,

    #[error("project root directory '{0}' does not exist")]
    SourceRootMissing(String),

    #[error("CODEQL_EXTRACTOR_JAVASCRIPT_ROOT environment variable is not set")]
    JavaScriptRootMissing,

    #[error("JavaScript extractor autobuild script '{0}' does not exist")]
    AutobuildScriptMissing(String),
}

/// Validated host paths for an autobuild run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub codeql: PathBuf,
    pub javascript_root: PathBuf,
    pub autobuild_script: PathBuf,
}

impl HostEnvironment {
    /// Resolves every host path, collecting all problems instead of stopping at the first.
    pub fn discover(source_root: &Path) -> Result<Self, Vec<EnvironmentError>> {
        let mut errors = Vec::new();

        let codeql = find_codeql();
        if codeql.is_none() {
            errors.push(EnvironmentError::CodeqlNotFound);
        }

        if !source_root.is_dir() {
            errors.push(EnvironmentError::SourceRootMissing(
                source_root.display().to_string(),
            ));
        }

        let javascript_root = javascript_extractor_root(codeql.as_deref());
        if javascript_root.is_none() {
            errors.push(EnvironmentError::JavaScriptRootMissing);
        }

        let autobuild_script = javascript_root.as_deref().map(autobuild_script_path);
        if let Some(script) = &autobuild_script {
            if !script.is_file() {
                errors.push(EnvironmentError::AutobuildScriptMissing(
                    script.display().to_string(),
                ));
            }
        }

        match (codeql, javascript_root, autobuild_script) {
            (Some(codeql), Some(javascript_root), Some(autobuild_script)) if errors.is_empty() => {
                Ok(Self {
                    codeql,
                    javascript_root,
                    autobuild_script,
                })
            }
            _ => Err(errors),
        }
    }

    /// Variables the JavaScript extractor child process needs.
    pub fn javascript_env(&self) -> Vec<(String, String)> {
        let mut vars = vec![(
            JAVASCRIPT_ROOT_ENV.to_string(),
            self.javascript_root.display().to_string(),
        )];
        vars.extend(mirrored_extractor_env());
        vars.extend(index_filter_env(env::var(INDEX_FILTERS_ENV).ok().as_deref()));
        vars
    }

    /// Runs the JavaScript autobuild script from the source root. A failure is
    /// recorded as a diagnostic against the source root and returned as the message.
    pub fn run_javascript_extractor(
        &self,
        source_root: &Path,
        diagnostics: &dyn DiagnosticSink,
    ) -> Result<(), String> {
        info!(
            script = %self.autobuild_script.display(),
            "Extracting .cds.json files with the JavaScript extractor"
        );

        let status = Command::new(&self.autobuild_script)
            .current_dir(source_root)
            .envs(self.javascript_env())
            .stdin(Stdio::null())
            .status();

        let failure = match status {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => match status.code() {
                Some(code) => format!("JavaScript extractor failed with exit code {}", code),
                None => format!("JavaScript extractor failed: {}", status),
            },
            Err(e) => format!("Error running JavaScript extractor: {}", e),
        };

        error!(error = %failure, "JavaScript extraction failed");
        diagnostics.add(&Diagnostic::new(
            DiagnosticKind::JavaScriptExtractorFailure,
            source_root,
            failure.clone(),
        ));
        Err(failure)
    }
}

fn codeql_exe_name() -> &'static str {
    if cfg!(windows) {
        "codeql.exe"
    } else {
        "codeql"
    }
}

/// `$CODEQL_DIST/codeql`, else the `unpackedLocation` reported by `codeql version`.
pub fn find_codeql() -> Option<PathBuf> {
    if let Some(dist) = env::var_os(CODEQL_DIST_ENV).filter(|d| !d.is_empty()) {
        let exe = PathBuf::from(dist).join(codeql_exe_name());
        if exe.is_file() {
            return Some(exe);
        }
        debug!(path = %exe.display(), "CODEQL_DIST does not contain a codeql executable");
    }

    let output = run_captured(Command::new("codeql").args(["version", "--format=json"])).ok()?;
    if !output.success() {
        return None;
    }
    let version: Value = serde_json::from_str(&output.stdout).ok()?;
    let exe = PathBuf::from(version.get("unpackedLocation")?.as_str()?).join(codeql_exe_name());
    exe.is_file().then_some(exe)
}

/// `$CODEQL_EXTRACTOR_JAVASCRIPT_ROOT`, else `codeql resolve extractor --language=javascript`.
pub fn javascript_extractor_root(codeql: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = env::var_os(JAVASCRIPT_ROOT_ENV).filter(|r| !r.is_empty()) {
        return Some(PathBuf::from(root));
    }

    let codeql = codeql?;
    match run_captured(Command::new(codeql).args(["resolve", "extractor", "--language=javascript"])) {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
            Some(PathBuf::from(output.stdout.trim()))
        }
        Ok(output) => {
            error!(stderr = %output.stderr.trim(), "Error resolving JavaScript extractor root");
            None
        }
        Err(e) => {
            error!(error = %e, "Error resolving JavaScript extractor root");
            None
        }
    }
}

pub fn autobuild_script_path(javascript_root: &Path) -> PathBuf {
    let script = if cfg!(windows) {
        "autobuild.cmd"
    } else {
        "autobuild.sh"
    };
    javascript_root.join("tools").join(script)
}

/// `CODEQL_EXTRACTOR_JAVASCRIPT_*` copies of the set `CODEQL_EXTRACTOR_CDS_*` variables
pub fn mirrored_extractor_env() -> Vec<(String, String)> {
    MIRRORED_SUFFIXES
        .iter()
        .filter_map(|suffix| {
            env::var(format!("CODEQL_EXTRACTOR_CDS_{}", suffix))
                .ok()
                .map(|value| (format!("CODEQL_EXTRACTOR_JAVASCRIPT_{}", suffix), value))
        })
        .collect()
}

/// `LGTM_INDEX_FILTERS` restricted to CDS artifacts, keeping specific pre-existing
/// excludes.
pub fn lgtm_index_filters(existing: Option<&str>) -> String {
    let mut filters = BASE_INDEX_FILTERS.join("\n");

    if let Some(existing) = existing.filter(|e| !e.is_empty()) {
        info!(existing = %existing, "Found LGTM_INDEX_FILTERS already set");
        let kept: Vec<&str> = existing
            .split('\n')
            .filter(|line| {
                line.starts_with("exclude")
                    && !CATCH_ALL_EXCLUDES.iter().any(|pattern| line.contains(pattern))
            })
            .collect();
        filters.push('\n');
        filters.push_str(&kept.join("\n"));
    }

    filters
}

pub fn index_filter_env(existing: Option<&str>) -> Vec<(String, String)> {
    vec![
        (INDEX_FILTERS_ENV.to_string(), lgtm_index_filters(existing)),
        ("LGTM_INDEX_TYPESCRIPT".to_string(), "NONE".to_string()),
        ("LGTM_INDEX_FILETYPES".to_string(), ".cds:JSON".to_string()),
    ]
}
