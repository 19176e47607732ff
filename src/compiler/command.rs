//! Compiler command discovery
//!
//! Candidates are probed with `--version` in a fixed order and the first one that
//! answers wins. Probe results are memoized for the whole session, so each distinct
//! command runs at most once.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::util::{run_with_timeout, shell_command, shell_quote, TimedOutput};

/// Returned when no candidate answers
pub const DEFAULT_COMMAND: &str = "npx -y --package @sap/cds-dk cds";

const GLOBAL_COMMAND: &str = "cds";
const NPX_COMMANDS: [&str; 3] = [
    DEFAULT_COMMAND,
    "npx -y --package @sap/cds cds",
    "npx --yes @sap/cds-dk cds",
];

/// Variables that must not leak into probe subprocesses
const PROBE_ENV_BLOCKLIST: [&str; 2] = ["CODEQL_EXTRACTOR_CDS_WIP_DATABASE", "CODEQL_RUNNER"];

/// `<cache_dir>/node_modules/.bin/cds`
pub fn cache_binary(cache_dir: &Path) -> PathBuf {
    cache_dir.join("node_modules").join(".bin").join("cds")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandProbe {
    pub works: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandProbe {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            works: false,
            version: None,
            error: Some(error.into()),
        }
    }
}

/// Runs a single `--version` probe.
pub trait CommandProber: Send + Sync {
    fn probe(&self, command: &str, cwd: &Path) -> CommandProbe;
}

/// Probes through the platform shell with a bounded wait.
pub struct ShellProber {
    timeout: Duration,
}

impl ShellProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn version_regex() -> &'static Regex {
    static VERSION: OnceLock<Regex> = OnceLock::new();
    VERSION.get_or_init(|| Regex::new(r"(\d+\.\d+\.\d+)").expect("valid regex"))
}

/// First `MAJOR.MINOR.PATCH` in `output`
pub fn extract_version(output: &str) -> Option<String> {
    version_regex()
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

impl CommandProber for ShellProber {
    fn probe(&self, command: &str, cwd: &Path) -> CommandProbe {
        let mut cmd = shell_command(command, &["--version"]);
        cmd.current_dir(cwd);
        for var in PROBE_ENV_BLOCKLIST {
            cmd.env_remove(var);
        }

        match run_with_timeout(&mut cmd, self.timeout) {
            Ok(TimedOutput::Finished(output)) if output.success() => CommandProbe {
                works: true,
                version: extract_version(&output.stdout),
                error: None,
            },
            Ok(TimedOutput::Finished(output)) => CommandProbe::failed(format!(
                "exited with {}: {}",
                output.status,
                output.stderr.trim()
            )),
            Ok(TimedOutput::TimedOut) => {
                CommandProbe::failed(format!("timed out after {}s", self.timeout.as_secs()))
            }
            Err(e) => CommandProbe::failed(e.to_string()),
        }
    }
}

/// Session-wide memo of probe results
#[derive(Clone)]
pub struct CommandProbeCache {
    prober: Arc<dyn CommandProber>,
    results: Arc<RwLock<HashMap<String, CommandProbe>>>,
}

impl CommandProbeCache {
    pub fn new(prober: Arc<dyn CommandProber>) -> Self {
        Self {
            prober,
            results: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn probe(&self, command: &str, cwd: &Path) -> CommandProbe {
        if let Some(hit) = self.get(command) {
            return hit;
        }

        let result = self.prober.probe(command, cwd);
        if !result.works {
            debug!(command, error = ?result.error, "CDS command probe failed");
        }
        if let Ok(mut results) = self.results.write() {
            results.insert(command.to_string(), result.clone());
        }
        result
    }

    pub fn get(&self, command: &str) -> Option<CommandProbe> {
        self.results.read().ok()?.get(command).cloned()
    }

    pub fn len(&self) -> usize {
        self.results.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    ProvidedCache,
    CachedInstall,
    Global,
    Npx,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Strategy::ProvidedCache => "provided-cache",
            Strategy::CachedInstall => "cached-install",
            Strategy::Global => "global",
            Strategy::Npx => "npx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateReport {
    pub strategy: Strategy,
    pub command: String,
    #[serde(flatten)]
    pub probe: CommandProbe,
}

/// Every candidate for one cache directory and how it probed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandAnalysis {
    pub selected_command: Option<String>,
    pub selected_version: Option<String>,
    pub candidates: Vec<CandidateReport>,
}

/// Picks the compiler command for a project's cache directory.
pub struct CommandResolver<'a> {
    probes: &'a CommandProbeCache,
    source_root: &'a Path,
    cache_dirs: Vec<PathBuf>,
}

impl<'a> CommandResolver<'a> {
    /// `cache_root` is scanned once for `cds-*` installs that provide a binary.
    pub fn new(probes: &'a CommandProbeCache, source_root: &'a Path, cache_root: &Path) -> Self {
        let cache_dirs = discover_cache_dirs(cache_root);
        if !cache_dirs.is_empty() {
            info!(count = cache_dirs.len(), "Discovered CDS cache directories");
        }
        Self {
            probes,
            source_root,
            cache_dirs,
        }
    }

    pub fn cache_dirs(&self) -> &[PathBuf] {
        &self.cache_dirs
    }

    pub fn candidates(&self, cache_dir: Option<&Path>) -> Vec<(Strategy, String)> {
        let mut candidates = Vec::new();

        if let Some(dir) = cache_dir {
            let bin = cache_binary(dir);
            if bin.is_file() {
                candidates.push((Strategy::ProvidedCache, shell_quote(&bin.to_string_lossy())));
            }
        }

        for dir in &self.cache_dirs {
            if Some(dir.as_path()) == cache_dir {
                continue;
            }
            candidates.push((
                Strategy::CachedInstall,
                shell_quote(&cache_binary(dir).to_string_lossy()),
            ));
        }

        candidates.push((Strategy::Global, GLOBAL_COMMAND.to_string()));
        candidates.extend(NPX_COMMANDS.iter().map(|c| (Strategy::Npx, c.to_string())));
        candidates
    }

    /// First working candidate, else [`DEFAULT_COMMAND`].
    pub fn resolve(&self, cache_dir: Option<&Path>) -> String {
        for (strategy, command) in self.candidates(cache_dir) {
            let probe = self.probes.probe(&command, self.source_root);
            if probe.works {
                debug!(
                    command = %command,
                    strategy = strategy.label(),
                    version = probe.version.as_deref().unwrap_or("unknown"),
                    "Selected CDS command"
                );
                return command;
            }
        }

        warn!(fallback = DEFAULT_COMMAND, "No working CDS command found");
        DEFAULT_COMMAND.to_string()
    }

    /// Probes every candidate for debug output.
    pub fn analyze(&self, cache_dir: Option<&Path>) -> CommandAnalysis {
        let mut analysis = CommandAnalysis {
            selected_command: None,
            selected_version: None,
            candidates: Vec::new(),
        };

        for (strategy, command) in self.candidates(cache_dir) {
            let probe = self.probes.probe(&command, self.source_root);
            if probe.works && analysis.selected_command.is_none() {
                analysis.selected_command = Some(command.clone());
                analysis.selected_version = probe.version.clone();
            }
            analysis.candidates.push(CandidateReport {
                strategy,
                command,
                probe,
            });
        }
        analysis
    }
}

/// `cds-*` directories under `cache_root` holding a compiler binary, sorted
pub fn discover_cache_dirs(cache_root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(cache_root) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|e| e.file_name().to_string_lossy().starts_with("cds-"))
        .map(|e| e.path())
        .filter(|dir| cache_binary(dir).is_file())
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Answers for a fixed set of commands and counts calls.
    struct FakeProber {
        working: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeProber {
        fn new(working: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                working: working.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl CommandProber for FakeProber {
        fn probe(&self, command: &str, _cwd: &Path) -> CommandProbe {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.working.iter().any(|w| w == command) {
                CommandProbe {
                    works: true,
                    version: Some("8.0.2".to_string()),
                    error: None,
                }
            } else {
                CommandProbe::failed("not found")
            }
        }
    }

    fn install(cache_root: &Path, name: &str) -> PathBuf {
        let dir = cache_root.join(name);
        let bin = cache_binary(&dir);
        fs::create_dir_all(bin.parent().unwrap()).unwrap();
        fs::write(&bin, "#!/bin/sh\n").unwrap();
        dir
    }

    #[test]
    fn test_probes_are_memoized() {
        let prober = FakeProber::new(&["cds"]);
        let cache = CommandProbeCache::new(prober.clone());
        let dir = TempDir::new().unwrap();

        assert!(cache.probe("cds", dir.path()).works);
        assert!(cache.probe("cds", dir.path()).works);
        assert!(!cache.probe("missing", dir.path()).works);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_candidate_order() {
        let dir = TempDir::new().unwrap();
        let cache_root = dir.path().join(".cds-extractor-cache");
        let mine = install(&cache_root, "cds-aaa");
        install(&cache_root, "cds-bbb");
        fs::create_dir_all(cache_root.join("unrelated")).unwrap();

        let cache = CommandProbeCache::new(FakeProber::new(&[]));
        let resolver = CommandResolver::new(&cache, dir.path(), &cache_root);
        let candidates = resolver.candidates(Some(&mine));

        let strategies: Vec<_> = candidates.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            strategies,
            vec![
                Strategy::ProvidedCache,
                Strategy::CachedInstall,
                Strategy::Global,
                Strategy::Npx,
                Strategy::Npx,
                Strategy::Npx
            ]
        );
        assert!(candidates[1].1.contains("cds-bbb"));
        assert_eq!(candidates[3].1, DEFAULT_COMMAND);
    }

    #[test]
    fn test_resolve_prefers_provided_cache() {
        let dir = TempDir::new().unwrap();
        let cache_root = dir.path().join("cache");
        let mine = install(&cache_root, "cds-mine");
        let bin = shell_quote(&cache_binary(&mine).to_string_lossy());

        let cache = CommandProbeCache::new(FakeProber::new(&[bin.as_str(), "cds"]));
        let resolver = CommandResolver::new(&cache, dir.path(), &cache_root);
        assert_eq!(resolver.resolve(Some(&mine)), bin);
        assert_eq!(resolver.resolve(None), bin);
    }

    #[test]
    fn test_resolve_falls_back_to_global_then_default() {
        let dir = TempDir::new().unwrap();
        let cache = CommandProbeCache::new(FakeProber::new(&["cds"]));
        let resolver = CommandResolver::new(&cache, dir.path(), &dir.path().join("none"));
        assert_eq!(resolver.resolve(None), "cds");

        let cache = CommandProbeCache::new(FakeProber::new(&[]));
        let resolver = CommandResolver::new(&cache, dir.path(), &dir.path().join("none"));
        assert_eq!(resolver.resolve(None), DEFAULT_COMMAND);
    }

    #[test]
    fn test_analysis_reports_every_candidate() {
        let dir = TempDir::new().unwrap();
        let cache = CommandProbeCache::new(FakeProber::new(&["npx -y --package @sap/cds cds"]));
        let resolver = CommandResolver::new(&cache, dir.path(), &dir.path().join("none"));
        let analysis = resolver.analyze(None);

        assert_eq!(analysis.candidates.len(), 4);
        assert_eq!(
            analysis.selected_command.as_deref(),
            Some("npx -y --package @sap/cds cds")
        );
        assert_eq!(analysis.selected_version.as_deref(), Some("8.0.2"));
        assert_eq!(analysis.candidates[0].strategy.label(), "global");
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version("@sap/cds-dk: 7.9.4\n@sap/cds: 7.9.3").as_deref(),
            Some("7.9.4")
        );
        assert_eq!(extract_version("no version here"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_prober_runs_script() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake-cds");
        fs::write(&script, "#!/bin/sh\necho \"@sap/cds-dk: 8.1.0\"\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let prober = ShellProber::new(Duration::from_secs(5));
        let probe = prober.probe(&shell_quote(&script.to_string_lossy()), dir.path());
        assert!(probe.works);
        assert_eq!(probe.version.as_deref(), Some("8.1.0"));

        let probe = prober.probe("exit 1;", dir.path());
        assert!(!probe.works);
    }
}
