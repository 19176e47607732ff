//! Shared helpers for integration tests

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Stand-in for the CDS compiler. Writes `{"definitions":{}}` to the `--dest` path and
/// fails for any argument mentioning `broken`.
#[allow(dead_code)]
pub const FAKE_CDS_SCRIPT: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "@sap/cds-dk: 8.3.0"
  exit 0
fi
if [ "$1" != "compile" ]; then
  echo "unsupported command: $1" >&2
  exit 2
fi
shift
dest=""
while [ $# -gt 0 ]; do
  case "$1" in
    --dest) dest="$2"; shift ;;
    *broken*) echo "[ERROR] $1: Syntax error, unexpected token" >&2; exit 1 ;;
  esac
  shift
done
mkdir -p "$(dirname "$dest")"
echo '{"definitions":{}}' > "$dest"
"#;

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/cds")
        .join(name)
}

/// Copies a fixture into a fresh temporary directory so runs can write outputs.
#[allow(dead_code)]
pub fn copy_fixture(name: &str) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    copy_dir(&fixture_path(name), dir.path());
    dir
}

#[allow(dead_code)]
fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).expect("Failed to create directory");
    for entry in fs::read_dir(from).expect("Failed to read fixture directory") {
        let entry = entry.expect("Failed to read fixture entry");
        let target = to.join(entry.file_name());
        if entry.file_type().expect("Failed to stat fixture entry").is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).expect("Failed to copy fixture file");
        }
    }
}

/// Installs the fake compiler as an already-populated dependency cache under
/// `<source_root>/.cds-extractor-cache/cds-fake`, where command resolution finds it.
#[cfg(unix)]
#[allow(dead_code)]
pub fn install_fake_compiler(source_root: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let cache_dir = source_root.join(".cds-extractor-cache/cds-fake");
    let bin_dir = cache_dir.join("node_modules/.bin");
    fs::create_dir_all(&bin_dir).expect("Failed to create cache bin dir");
    fs::create_dir_all(cache_dir.join("node_modules/@sap/cds")).expect("Failed to create cds dir");
    fs::create_dir_all(cache_dir.join("node_modules/@sap/cds-dk"))
        .expect("Failed to create cds-dk dir");

    let script = bin_dir.join("cds");
    fs::write(&script, FAKE_CDS_SCRIPT).expect("Failed to write fake cds");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake cds executable");
    cache_dir
}

/// Helper to get the path to the cds-extractor binary
#[allow(dead_code)]
pub fn cds_extractor_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_cds-extractor"))
}
