#![allow(dead_code)]

use std::path::{Path, PathBuf};

use diffcov::config::Config;
use diffcov::diff::DiffFile;
use tempfile::TempDir;

/// Absolute path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// A diff source reading `tests/fixtures/diffs/<name>`.
pub fn diff_fixture(name: &str) -> DiffFile {
    DiffFile {
        path: fixture(&format!("diffs/{name}")),
    }
}

/// Write `content` to `name` inside a fresh temporary directory.
/// The caller must hold onto `TempDir` to keep the file alive.
pub fn temp_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), name, content);
    (dir, path)
}

pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Defaults, minus the Java source roots that would only add lookups.
pub fn config() -> Config {
    Config {
        src_roots: Vec::new(),
        ..Default::default()
    }
}
