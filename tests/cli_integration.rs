//! CLI integration tests
//!
//! These tests run the cds-extractor binary and check:
//! - Command parsing and help output
//! - Graph output formats
//! - Exit codes for each run mode

mod support;

use std::fs;
use std::process::Command;
use support::{cds_extractor_bin, copy_fixture, fixture_path};
use tempfile::TempDir;

fn cds_extractor() -> Command {
    let mut command = Command::new(cds_extractor_bin());
    command
        .env_remove("RUST_LOG")
        .env_remove("CDS_EXTRACTOR_CACHE_DIR_NAME")
        .env("CDS_EXTRACTOR_LOG_LEVEL", "warn");
    command
}

#[test]
fn test_cli_help() {
    let output = cds_extractor()
        .arg("--help")
        .output()
        .expect("Failed to execute cds-extractor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("autobuild"));
    assert!(stdout.contains("debug-parser"));
    assert!(stdout.contains("debug-compiler"));
}

#[test]
fn test_cli_version() {
    let output = cds_extractor()
        .arg("--version")
        .output()
        .expect("Failed to execute cds-extractor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_debug_parser_json() {
    let output = cds_extractor()
        .args(["debug-parser", "--format", "json"])
        .arg(fixture_path("monorepo"))
        .output()
        .expect("Failed to execute cds-extractor");

    assert!(output.status.success());
    let graph: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(graph["statusSummary"]["totalProjects"], 2);
    assert_eq!(
        graph["projects"]["packages/orders"]["dependencies"],
        serde_json::json!(["packages/common"])
    );
}

#[test]
fn test_debug_parser_human_to_file() {
    let out_dir = TempDir::new().unwrap();
    let out_file = out_dir.path().join("graph.txt");

    let status = cds_extractor()
        .args(["debug-parser", "--format", "human", "--output"])
        .arg(&out_file)
        .arg(fixture_path("bookshop"))
        .status()
        .expect("Failed to execute cds-extractor");

    assert!(status.success());
    let content = fs::read_to_string(out_file).unwrap();
    assert!(content.starts_with("CDS Dependency Graph\n"));
    assert!(content.contains("Plan:          project-level"));
}

#[test]
fn test_debug_parser_without_projects_fails() {
    let output = cds_extractor()
        .arg("debug-parser")
        .arg(fixture_path("no-cds"))
        .output()
        .expect("Failed to execute cds-extractor");

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_missing_subcommand_argument() {
    let output = cds_extractor()
        .arg("autobuild")
        .output()
        .expect("Failed to execute cds-extractor");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SOURCE_ROOT"));
}

#[test]
fn test_autobuild_without_codeql_fails() {
    let empty_path = TempDir::new().unwrap();
    let output = cds_extractor()
        .arg("autobuild")
        .arg(fixture_path("bookshop"))
        .env_remove("CODEQL_DIST")
        .env_remove("CODEQL_EXTRACTOR_JAVASCRIPT_ROOT")
        .env("PATH", empty_path.path())
        .output()
        .expect("Failed to execute cds-extractor");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CodeQL executable not found"));
    assert!(stderr.contains("CODEQL_EXTRACTOR_JAVASCRIPT_ROOT"));
}

#[cfg(unix)]
mod unix {
    use super::*;
    use cds_extractor::packages::installer::combination_hash;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn executable(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_debug_compiler_report() {
        let dir = copy_fixture("bookshop");
        support::install_fake_compiler(dir.path());

        let output = cds_extractor()
            .args(["debug-compiler", "--skip-install"])
            .arg(dir.path())
            .output()
            .expect("Failed to execute cds-extractor");

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(output.status.success(), "stdout: {}", stdout);
        assert!(stdout.contains("CDS EXTRACTOR DEBUG STATUS REPORT"));
        assert!(stdout.contains("  Status: SUCCESS\n"));
        assert!(stdout.contains("  [cached-install] "));
        assert!(dir.path().join("model.cds.json").is_file());
    }

    #[test]
    fn test_autobuild_end_to_end() {
        let dir = copy_fixture("bookshop");
        let tools = TempDir::new().unwrap();

        // npm is unavailable, so the requested ranges key the cache directory.
        let cache_dir = dir
            .path()
            .join(".cds-extractor-cache")
            .join(format!("cds-{}", combination_hash("^8.0.0", "^8.0.0")));
        fs::create_dir_all(cache_dir.join("node_modules/@sap/cds")).unwrap();
        fs::create_dir_all(cache_dir.join("node_modules/@sap/cds-dk")).unwrap();
        executable(
            &cache_dir.join("node_modules/.bin/cds"),
            support::FAKE_CDS_SCRIPT,
        );

        let bin = tools.path().join("bin");
        executable(&bin.join("npm"), "#!/bin/sh\nexit 1\n");
        let dist = tools.path().join("codeql");
        executable(&dist.join("codeql"), "#!/bin/sh\nexit 0\n");
        let js_root = tools.path().join("javascript");
        let marker = tools.path().join("filters.txt");
        executable(
            &js_root.join("tools/autobuild.sh"),
            &format!(
                "#!/bin/sh\nprintf '%s' \"$LGTM_INDEX_FILTERS\" > {}\n",
                marker.display()
            ),
        );

        let output = cds_extractor()
            .arg("autobuild")
            .arg(dir.path())
            .env("PATH", format!("{}:/usr/bin:/bin", bin.display()))
            .env("CODEQL_DIST", &dist)
            .env("CODEQL_EXTRACTOR_JAVASCRIPT_ROOT", &js_root)
            .env("CODEQL_EXTRACTOR_CDS_WIP_DATABASE", tools.path().join("db"))
            .env_remove("LGTM_INDEX_FILTERS")
            .output()
            .expect("Failed to execute cds-extractor");

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr);
        assert!(dir.path().join("model.cds.json").is_file());
        assert_eq!(
            fs::read_to_string(marker).unwrap(),
            "exclude:**/*.*\ninclude:**/*.cds.json\ninclude:**/*.cds\nexclude:**/node_modules/**/*.*"
        );
    }

    #[test]
    fn test_autobuild_without_manifests_uses_global_tooling() {
        let dir = copy_fixture("standalone");
        support::install_fake_compiler(dir.path());
        let tools = TempDir::new().unwrap();

        let bin = tools.path().join("bin");
        executable(&bin.join("npm"), "#!/bin/sh\nexit 1\n");
        let dist = tools.path().join("codeql");
        executable(&dist.join("codeql"), "#!/bin/sh\nexit 0\n");
        let js_root = tools.path().join("javascript");
        let marker = tools.path().join("extracted");
        executable(
            &js_root.join("tools/autobuild.sh"),
            &format!("#!/bin/sh\ntouch {}\n", marker.display()),
        );

        let output = cds_extractor()
            .arg("autobuild")
            .arg(dir.path())
            .env("PATH", format!("{}:/usr/bin:/bin", bin.display()))
            .env("CODEQL_DIST", &dist)
            .env("CODEQL_EXTRACTOR_JAVASCRIPT_ROOT", &js_root)
            .env("CODEQL_EXTRACTOR_CDS_WIP_DATABASE", tools.path().join("db"))
            .env_remove("LGTM_INDEX_FILTERS")
            .output()
            .expect("Failed to execute cds-extractor");

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert_eq!(output.status.code(), Some(0), "stderr: {}", stderr);
        assert!(marker.is_file());
        assert!(dir.path().join("models/main.cds.json").is_file());
    }
}
