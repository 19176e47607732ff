//! Resolution of requested `@sap/cds` / `@sap/cds-dk` ranges to published versions

use serde::Serialize;

use super::registry::VersionCache;
use super::version::{find_best_available_version, is_satisfying_version, SemanticVersion};
use crate::project::manifest::{CDS_DK_PACKAGE, CDS_PACKAGE, LATEST};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResolution {
    pub resolved_cds_version: Option<String>,
    pub resolved_cds_dk_version: Option<String>,
    pub cds_exact_match: bool,
    pub cds_dk_exact_match: bool,
    /// At least one side had to fall back to a version outside its range
    pub is_fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compatibility {
    pub is_compatible: bool,
    pub warning: Option<String>,
}

/// Checks whether two resolved versions are likely to work together.
pub fn check_version_compatibility(cds_version: &str, cds_dk_version: &str) -> Compatibility {
    if cds_version == LATEST || cds_dk_version == LATEST {
        return Compatibility {
            is_compatible: true,
            warning: None,
        };
    }

    let (Some(cds), Some(cds_dk)) = (
        SemanticVersion::parse(cds_version),
        SemanticVersion::parse(cds_dk_version),
    ) else {
        return Compatibility {
            is_compatible: false,
            warning: Some("Unable to parse version numbers for compatibility check".to_string()),
        };
    };

    if cds.major != cds_dk.major {
        return Compatibility {
            is_compatible: false,
            warning: Some(format!(
                "Major version mismatch: {} {} and {} {} may not be compatible",
                CDS_PACKAGE, cds_version, CDS_DK_PACKAGE, cds_dk_version
            )),
        };
    }

    if cds.minor != cds_dk.minor {
        return Compatibility {
            is_compatible: true,
            warning: Some(format!(
                "Minor version difference: {} {} and {} {} - consider aligning versions for best compatibility",
                CDS_PACKAGE, cds_version, CDS_DK_PACKAGE, cds_dk_version
            )),
        };
    }

    Compatibility {
        is_compatible: true,
        warning: None,
    }
}

fn is_exact(resolved: Option<&str>, requested: &str) -> bool {
    match resolved {
        Some(resolved) => resolved == requested || requested == LATEST,
        None => false,
    }
}

/// Picks the best published pair for the requested ranges.
pub fn resolve_cds_versions(
    versions: &VersionCache,
    cds_version: &str,
    cds_dk_version: &str,
) -> VersionResolution {
    let cds_available = versions.available_versions(CDS_PACKAGE);
    let cds_dk_available = versions.available_versions(CDS_DK_PACKAGE);

    let resolved_cds = find_best_available_version(&cds_available, cds_version);
    let resolved_cds_dk = find_best_available_version(&cds_dk_available, cds_dk_version);

    let cds_exact_match = is_exact(resolved_cds.as_deref(), cds_version);
    let cds_dk_exact_match = is_exact(resolved_cds_dk.as_deref(), cds_dk_version);

    let satisfied = |resolved: &Option<String>, requested: &str| {
        resolved
            .as_deref()
            .map(|r| is_satisfying_version(r, requested))
            .unwrap_or(false)
    };
    let is_fallback =
        !satisfied(&resolved_cds, cds_version) || !satisfied(&resolved_cds_dk, cds_dk_version);

    let mut warning = None;
    if let (Some(cds), Some(cds_dk)) = (&resolved_cds, &resolved_cds_dk) {
        let compatibility = check_version_compatibility(cds, cds_dk);
        let surface = is_fallback
            || !cds_exact_match
            || !cds_dk_exact_match
            || (compatibility.warning.is_some() && !compatibility.is_compatible);
        if surface {
            warning = compatibility.warning;
        }
    }

    VersionResolution {
        resolved_cds_version: resolved_cds,
        resolved_cds_dk_version: resolved_cds_dk,
        cds_exact_match,
        cds_dk_exact_match,
        is_fallback,
        warning,
    }
}
