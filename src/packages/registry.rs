//! Published-version lookup with a per-session cache

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::util::{run_with_timeout, TimedOutput};

/// Source of published package versions
pub trait VersionSource: Send + Sync {
    /// Every published version of `package`; an empty list when the lookup fails.
    fn published_versions(&self, package: &str) -> Vec<String>;
}

/// Queries the npm registry through `npm view <pkg> versions --json`.
pub struct NpmRegistry {
    working_dir: PathBuf,
    timeout: Duration,
}

impl NpmRegistry {
    pub fn new(working_dir: &Path, timeout: Duration) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            timeout,
        }
    }
}

impl VersionSource for NpmRegistry {
    fn published_versions(&self, package: &str) -> Vec<String> {
        let mut cmd = Command::new("npm");
        cmd.args(["view", package, "versions", "--json"])
            .current_dir(&self.working_dir);

        let output = match run_with_timeout(&mut cmd, self.timeout) {
            Ok(TimedOutput::Finished(output)) if output.success() => output,
            Ok(TimedOutput::Finished(output)) => {
                warn!(package, stderr = %output.stderr.trim(), "npm view failed");
                return Vec::new();
            }
            Ok(TimedOutput::TimedOut) => {
                warn!(package, timeout_secs = self.timeout.as_secs(), "npm view timed out");
                return Vec::new();
            }
            Err(e) => {
                warn!(package, error = %e, "Failed to fetch versions");
                return Vec::new();
            }
        };

        parse_versions_output(&output.stdout).unwrap_or_else(|| {
            warn!(package, "Unparseable npm view output");
            Vec::new()
        })
    }
}

/// `npm view --json` prints a list, or a bare string when only one version exists.
pub fn parse_versions_output(stdout: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(stdout).ok()? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        Value::String(single) => Some(vec![single]),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit percentage with one decimal, `0.0` before any lookup
    pub fn hit_rate(&self) -> String {
        let total = self.hits + self.misses;
        if total == 0 {
            return "0.0".to_string();
        }
        format!("{:.1}", self.hits as f64 * 100.0 / total as f64)
    }
}

/// Memoizes [`VersionSource`] lookups for one run. Failed lookups are cached as empty.
#[derive(Clone)]
pub struct VersionCache {
    source: Arc<dyn VersionSource>,
    versions: Arc<RwLock<HashMap<String, Vec<String>>>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl VersionCache {
    pub fn new(source: Arc<dyn VersionSource>) -> Self {
        Self {
            source,
            versions: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    pub fn available_versions(&self, package: &str) -> Vec<String> {
        let cached = self
            .versions
            .read()
            .ok()
            .and_then(|v| v.get(package).cloned());

        if let Some(versions) = cached {
            self.bump(|s| s.hits += 1);
            return versions;
        }

        self.bump(|s| s.misses += 1);
        let versions = self.source.published_versions(package);
        debug!(package, count = versions.len(), "Fetched published versions");
        if let Ok(mut cache) = self.versions.write() {
            cache.insert(package.to_string(), versions.clone());
        }
        versions
    }

    fn bump(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.read().map(|s| *s).unwrap_or_default()
    }

    pub fn cached_packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = self
            .versions
            .read()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        packages.sort();
        packages
    }
}

/// Fixed version lists, for offline runs and tests
#[derive(Debug, Default, Clone)]
pub struct StaticVersions {
    versions: HashMap<String, Vec<String>>,
}

impl StaticVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, package: &str, versions: &[&str]) -> Self {
        self.versions.insert(
            package.to_string(),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }
}

impl VersionSource for StaticVersions {
    fn published_versions(&self, package: &str) -> Vec<String> {
        self.versions.get(package).cloned().unwrap_or_default()
    }
}
