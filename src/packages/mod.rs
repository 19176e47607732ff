//! CDS toolchain versions: resolution against the registry and cached installs

pub mod installer;
pub mod registry;
pub mod resolver;
pub mod version;

pub use installer::{
    DependencyInstaller, InstallRunner, InstallSummary, NpmInstall, ProjectRequest, VersionCombination,
};
pub use registry::{CacheStats, NpmRegistry, StaticVersions, VersionCache, VersionSource};
pub use resolver::{check_version_compatibility, resolve_cds_versions, VersionResolution};
pub use version::SemanticVersion;
