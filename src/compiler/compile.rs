//! Invocation of the CDS compiler for single files and whole projects

use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

use crate::project::detector::STANDARD_DIRS;
use crate::project::graph::ProjectRecord;
use crate::project::paths::{absolute, in_project, parent_key, ROOT_DIR};
use crate::project::planner::PROJECT_MODEL_FILE;
use crate::project::walk;
use crate::util::{run_captured, shell_command};

const UNKNOWN_ERROR: &str = "Unknown error";

/// Variables that make a direct cache binary pick up the wrong installation
const CONFLICTING_ENV: [&str; 4] = ["NODE_PATH", "npm_config_prefix", "npm_config_global", "CDS_HOME"];

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Expected CDS file '{0}' does not exist.")]
    MissingSource(String),

    #[error("Project directory '{0}' does not contain any CDS files and cannot be compiled")]
    NoCdsFiles(String),

    #[error("Could not compile the file {file}.\nReported error(s):\n```\n{stderr}\n```")]
    FileFailed { file: String, stderr: String },

    #[error("Could not compile the CAP project {project}.\nReported error(s):\n```\n{stderr}\n```")]
    ProjectFailed { project: String, stderr: String },

    #[error("CDS source file '{0}' was not compiled to JSON. This is likely because the file does not exist or is not a valid CDS file.")]
    FileNotCompiled(String),

    #[error("CAP project '{0}' was not compiled to JSON. This is likely because the project structure is invalid.")]
    ProjectNotCompiled(String),

    #[error("Error executing CDS compiler: {0}")]
    Spawn(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    /// Root-relative path of the produced artifact
    pub output_path: String,
    pub compiled_as_project: bool,
}

/// Runs one resolved compiler command from the source root.
pub struct CdsCompiler<'a> {
    source_root: &'a Path,
    command: String,
    cache_dir: Option<PathBuf>,
}

impl<'a> CdsCompiler<'a> {
    pub fn new(source_root: &'a Path, command: impl Into<String>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            source_root,
            command: command.into(),
            cache_dir,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Compiles one root-relative file to `<file>.json`.
    pub fn compile_file(&self, file: &str) -> Result<CompileOutcome, CompileError> {
        if !absolute(self.source_root, file).exists() {
            return Err(CompileError::MissingSource(file.to_string()));
        }

        let dest = format!("{}.json", file);
        info!(file, dest = %dest, "Compiling CDS file");

        let output = self.run(&compile_args(&[file.to_string()], &dest))?;
        if !output.success() {
            return Err(CompileError::FileFailed {
                file: file.to_string(),
                stderr: stderr_or_unknown(&output.stderr),
            });
        }

        let dest_path = absolute(self.source_root, &dest);
        if !dest_path.exists() {
            return Err(CompileError::FileNotCompiled(file.to_string()));
        }
        if dest_path.is_dir() {
            let renamed = rename_json_outputs(&dest_path)?;
            debug!(dir = %dest, renamed, "Normalized compiler output directory");
        }

        Ok(CompileOutcome {
            output_path: dest,
            compiled_as_project: false,
        })
    }

    /// Compiles the whole project into `<project>/model.cds.json`.
    pub fn compile_project(&self, project: &ProjectRecord) -> Result<CompileOutcome, CompileError> {
        if project.cds_files.is_empty() {
            return Err(CompileError::NoCdsFiles(project.project_dir.clone()));
        }

        let targets = project_targets(self.source_root, project);
        let dest = in_project(&project.project_dir, PROJECT_MODEL_FILE);
        info!(
            project = %project.project_dir,
            targets = ?targets,
            dest = %dest,
            "Compiling CAP project"
        );

        let output = self.run(&compile_args(&targets, &dest))?;
        if !output.success() {
            return Err(CompileError::ProjectFailed {
                project: project.project_dir.clone(),
                stderr: stderr_or_unknown(&output.stderr),
            });
        }

        let dest_path = absolute(self.source_root, &dest);
        if !dest_path.exists() {
            return Err(CompileError::ProjectNotCompiled(project.project_dir.clone()));
        }
        if dest_path.is_dir() {
            let renamed = rename_json_outputs(&dest_path)?;
            debug!(dir = %dest, renamed, "Normalized compiler output directory");
        }

        Ok(CompileOutcome {
            output_path: dest,
            compiled_as_project: true,
        })
    }

    fn run(&self, args: &[String]) -> io::Result<crate::util::CommandOutput> {
        let mut cmd = shell_command(&self.command, args);
        cmd.current_dir(self.source_root);
        apply_cache_env(&mut cmd, &self.command, self.cache_dir.as_deref());
        debug!(command = %self.command, args = ?args, "Running CDS compiler");
        run_captured(&mut cmd)
    }
}

fn stderr_or_unknown(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn compile_args(targets: &[String], dest: &str) -> Vec<String> {
    let mut args = vec!["compile".to_string()];
    args.extend(targets.iter().cloned());
    args.extend(
        ["--to", "json", "--dest", dest, "--locations", "--log-level", "warn"]
            .iter()
            .map(|s| s.to_string()),
    );
    args
}

/// Root-relative compiler inputs for a project-level compilation.
///
/// The standard `db`, `srv` and `app` directories when any exist, else the project
/// directory itself when it holds `.cds` files directly, else the parent directory of
/// every project file.
pub fn project_targets(source_root: &Path, project: &ProjectRecord) -> Vec<String> {
    let dir = &project.project_dir;
    let project_path = absolute(source_root, dir);

    let standard: Vec<String> = STANDARD_DIRS
        .iter()
        .filter(|d| project_path.join(d).is_dir())
        .map(|d| in_project(dir, d))
        .collect();
    if !standard.is_empty() {
        return standard;
    }

    if walk::has_direct_cds_files(&project_path) {
        return vec![in_project(dir, ROOT_DIR)];
    }

    let parents: BTreeSet<&str> = project.cds_files.iter().map(|f| parent_key(f)).collect();
    parents.into_iter().map(str::to_string).collect()
}

/// Points the child at the cache install, or strips conflicting variables when
/// `command` is already a direct path into a cache.
pub fn apply_cache_env(cmd: &mut Command, command: &str, cache_dir: Option<&Path>) {
    if command.contains("node_modules/.bin/") {
        for var in CONFLICTING_ENV {
            cmd.env_remove(var);
        }
        return;
    }

    let Some(cache) = cache_dir else {
        return;
    };
    let node_modules = cache.join("node_modules");
    cmd.env("NODE_PATH", prepend_path(node_modules.clone(), env::var_os("NODE_PATH")))
        .env("PATH", prepend_path(node_modules.join(".bin"), env::var_os("PATH")))
        .env("npm_config_prefix", cache)
        .env("npm_config_global", "false")
        .env("CDS_HOME", cache);
}

fn prepend_path(first: PathBuf, existing: Option<OsString>) -> OsString {
    let mut paths = vec![first.clone()];
    if let Some(existing) = existing {
        paths.extend(env::split_paths(&existing));
    }
    env::join_paths(paths).unwrap_or_else(|_| first.into_os_string())
}

/// Renames every `*.json` under `dir` to `*.cds.json`, hidden entries and
/// `node_modules` included; already-normalized files are left alone. Returns the number
/// of renamed files.
pub fn rename_json_outputs(dir: &Path) -> io::Result<usize> {
    let mut pending = Vec::new();
    for entry in WalkBuilder::new(dir)
        .standard_filters(false)
        .hidden(false)
        .build()
    {
        let entry = entry.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(".json") && !name.ends_with(".cds.json") {
            pending.push(entry.into_path());
        }
    }

    for path in &pending {
        fs::rename(path, path.with_extension("cds.json"))?;
    }
    Ok(pending.len())
}
