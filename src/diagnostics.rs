//! Structured diagnostics recorded into the CodeQL database

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tracing::{error, info};

use crate::util::run_captured;

pub const EXTRACTOR_NAME: &str = "cds";
pub const WIP_DATABASE_ENV: &str = "CODEQL_EXTRACTOR_CDS_WIP_DATABASE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    CompilationFailure,
    DependencyVersionFallback,
    JavaScriptExtractorFailure,
}

impl DiagnosticKind {
    pub fn source_id(&self) -> &'static str {
        match self {
            DiagnosticKind::CompilationFailure => "cds/compilation-failure",
            DiagnosticKind::DependencyVersionFallback => "cds/dependency-version-fallback",
            DiagnosticKind::JavaScriptExtractorFailure => "cds/js-extractor-failure",
        }
    }

    pub fn source_name(&self) -> &'static str {
        match self {
            DiagnosticKind::CompilationFailure => {
                "Failure to compile one or more SAP CAP CDS files"
            }
            DiagnosticKind::DependencyVersionFallback => {
                "Using fallback versions for SAP CAP CDS dependencies"
            }
            DiagnosticKind::JavaScriptExtractorFailure => {
                "Failure in JavaScript extractor for SAP CAP CDS files"
            }
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::DependencyVersionFallback => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file_path: PathBuf,
    /// Markdown body
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, file_path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file_path: file_path.into(),
            message: message.into(),
        }
    }
}

/// Destination for diagnostics. Recording failures are reported through the return
/// value and never abort the run.
pub trait DiagnosticSink: Send + Sync {
    fn add(&self, diagnostic: &Diagnostic) -> bool;
}

impl<D: DiagnosticSink + ?Sized> DiagnosticSink for Arc<D> {
    fn add(&self, diagnostic: &Diagnostic) -> bool {
        (**self).add(diagnostic)
    }
}

/// Appends diagnostics via `codeql database add-diagnostic`.
pub struct CodeqlDiagnostics {
    codeql: PathBuf,
    database: String,
}

impl CodeqlDiagnostics {
    pub fn new(codeql: &Path, database: impl Into<String>) -> Self {
        Self {
            codeql: codeql.to_path_buf(),
            database: database.into(),
        }
    }

    /// Targets the database named by `CODEQL_EXTRACTOR_CDS_WIP_DATABASE`.
    pub fn from_env(codeql: &Path) -> Self {
        Self::new(codeql, env::var(WIP_DATABASE_ENV).unwrap_or_default())
    }

    pub fn args(&self, diagnostic: &Diagnostic) -> Vec<String> {
        let file_path = absolutize(&diagnostic.file_path);
        vec![
            "database".to_string(),
            "add-diagnostic".to_string(),
            format!("--extractor-name={}", EXTRACTOR_NAME),
            "--ready-for-status-page".to_string(),
            format!("--source-id={}", diagnostic.kind.source_id()),
            format!("--source-name={}", diagnostic.kind.source_name()),
            format!("--severity={}", diagnostic.kind.severity().as_str()),
            format!("--markdown-message={}", diagnostic.message),
            format!("--file-path={}", file_path.display()),
            "--".to_string(),
            self.database.clone(),
        ]
    }
}

impl DiagnosticSink for CodeqlDiagnostics {
    fn add(&self, diagnostic: &Diagnostic) -> bool {
        let severity = diagnostic.kind.severity().as_str();
        let result = run_captured(Command::new(&self.codeql).args(self.args(diagnostic)));
        match result {
            Ok(output) if output.success() => {
                info!(
                    severity,
                    source_id = diagnostic.kind.source_id(),
                    file = %diagnostic.file_path.display(),
                    "Added diagnostic"
                );
                true
            }
            Ok(output) => {
                error!(
                    severity,
                    file = %diagnostic.file_path.display(),
                    stderr = %output.stderr.trim(),
                    "Failed to add diagnostic"
                );
                false
            }
            Err(e) => {
                error!(
                    severity,
                    file = %diagnostic.file_path.display(),
                    error = %e,
                    "Failed to add diagnostic"
                );
                false
            }
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Discards every diagnostic.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDiagnostics;

impl DiagnosticSink for NullDiagnostics {
    fn add(&self, _diagnostic: &Diagnostic) -> bool {
        false
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn add(&self, diagnostic: &Diagnostic) -> bool {
        match self.records.lock() {
            Ok(mut records) => {
                records.push(diagnostic.clone());
                true
            }
            Err(_) => false,
        }
    }
}
