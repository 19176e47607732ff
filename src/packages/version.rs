//! Semantic versions and npm-style version ranges
//!
//! Only the range forms found in CAP manifests are understood: `^`, `~`, `>=`, `>`,
//! `<=`, `<`, an exact version, and the `latest` tag.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

use crate::project::manifest::LATEST;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
    /// The string this version was parsed from, range prefix included
    pub original: String,
}

fn semver_regex() -> &'static Regex {
    static SEMVER: OnceLock<Regex> = OnceLock::new();
    SEMVER.get_or_init(|| {
        Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([a-zA-Z0-9.-]+))?(?:\+([a-zA-Z0-9.-]+))?$")
            .expect("valid regex")
    })
}

impl SemanticVersion {
    /// Parses a version or range string; `latest` maps to `999.999.999`.
    pub fn parse(version: &str) -> Option<Self> {
        if version == LATEST {
            return Some(Self {
                major: 999,
                minor: 999,
                patch: 999,
                prerelease: None,
                build: None,
                original: version.to_string(),
            });
        }

        let clean = version.trim_start_matches(['^', '~', '>', '=', '<']);
        let caps = semver_regex().captures(clean)?;
        Some(Self {
            major: caps.get(1)?.as_str().parse().ok()?,
            minor: caps.get(2)?.as_str().parse().ok()?,
            patch: caps.get(3)?.as_str().parse().ok()?,
            prerelease: caps.get(4).map(|m| m.as_str().to_string()),
            build: caps.get(5).map(|m| m.as_str().to_string()),
            original: version.to_string(),
        })
    }

    /// Precedence order; build metadata is ignored.
    pub fn precedence(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }

    pub fn satisfies(&self, range: &str) -> bool {
        satisfies_range(self, range)
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

pub fn satisfies_range(version: &SemanticVersion, range: &str) -> bool {
    if range == LATEST {
        return true;
    }
    let Some(bound) = SemanticVersion::parse(range) else {
        return false;
    };
    let ord = version.precedence(&bound);

    if range.starts_with('^') {
        version.major == bound.major && ord != Ordering::Less
    } else if range.starts_with('~') {
        version.major == bound.major && version.minor == bound.minor && ord != Ordering::Less
    } else if range.starts_with(">=") {
        ord != Ordering::Less
    } else if range.starts_with('>') {
        ord == Ordering::Greater
    } else if range.starts_with("<=") {
        ord != Ordering::Greater
    } else if range.starts_with('<') {
        ord == Ordering::Less
    } else {
        ord == Ordering::Equal
    }
}

/// Highest published version satisfying `requested`, else the highest published
/// version overall. `None` only when nothing published parses.
pub fn find_best_available_version(available: &[String], requested: &str) -> Option<String> {
    let parsed: Vec<SemanticVersion> = available
        .iter()
        .filter_map(|v| SemanticVersion::parse(v))
        .collect();

    let best = |candidates: &mut dyn Iterator<Item = &SemanticVersion>| {
        candidates
            .max_by(|a, b| a.precedence(b))
            .map(|v| v.original.clone())
    };

    best(&mut parsed.iter().filter(|v| v.satisfies(requested)))
        .or_else(|| best(&mut parsed.iter()))
}

/// True when `resolved` meets `requested`, including the exact-string and `latest` cases.
pub fn is_satisfying_version(resolved: &str, requested: &str) -> bool {
    if resolved == requested || requested == LATEST {
        return true;
    }
    SemanticVersion::parse(resolved)
        .map(|v| v.satisfies(requested))
        .unwrap_or(false)
}
