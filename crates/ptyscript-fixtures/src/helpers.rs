//! Common test helper functions.
//!
//! These cut the boilerplate of laying out a harness directory: a fixture
//! repository, a configuration file and the script files themselves.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ptyscript::model::HarnessConfig;

/// Create a unique temporary directory for a test.
///
/// The directory name includes a timestamp and the process id so parallel
/// test binaries do not collide. The directory is created immediately.
///
/// # Panics
///
/// Panics if the directory cannot be created.
#[must_use]
pub fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("ptyscript-{prefix}-{}-{stamp}", std::process::id()));

    #[allow(clippy::expect_used)]
    fs::create_dir_all(&dir).expect("failed to create temp directory");

    dir
}

/// Write a harness configuration to a JSON file.
///
/// # Panics
///
/// Panics if serialization or file writing fails.
pub fn write_config(path: &Path, config: &HarnessConfig) {
    #[allow(clippy::expect_used)]
    let data = serde_json::to_vec_pretty(config).expect("failed to serialize config");

    #[allow(clippy::expect_used)]
    fs::write(path, data).expect("failed to write config file");
}

/// Write a script file made of `lines` into `dir` and return its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
#[must_use]
pub fn write_script(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let mut contents = lines.join("\n");
    contents.push('\n');

    #[allow(clippy::expect_used)]
    fs::write(&path, contents).expect("failed to write script file");

    path
}

/// Locate a fixture binary built next to `sibling` (usually the binary
/// under test). Returns `None` when the fixture crate was not built.
#[must_use]
pub fn fixture_beside(sibling: &Path, name: &str) -> Option<PathBuf> {
    let fixture = sibling.parent()?.join(name);
    fixture.exists().then_some(fixture)
}
