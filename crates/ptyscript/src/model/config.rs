use crate::model::TerminalSize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default `expect` timeout in milliseconds.
pub const DEFAULT_EXPECT_TIMEOUT_MS: u64 = 1_000;

/// Harness configuration shared by every script of one invocation.
///
/// Relative paths are resolved against [`HarnessConfig::base_dir`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory holding the fixture and its setup command.
    pub base_dir: PathBuf,
    pub fixture: FixtureConfig,
    /// Tool under test, reachable from `run:` through its alias.
    pub tool: Option<ToolConfig>,
    /// Upper bound for a single `expect:` statement.
    pub expect_timeout_ms: u64,
    /// Shell started by `debug:` when no process is attached.
    pub debug_shell: String,
    /// Size of the pseudo-terminal given to spawned processes.
    pub terminal_size: TerminalSize,
    /// Echo settings for external commands (checkouts, fixture setup).
    pub echo: EchoOptions,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            fixture: FixtureConfig::default(),
            tool: Some(ToolConfig::default()),
            expect_timeout_ms: DEFAULT_EXPECT_TIMEOUT_MS,
            debug_shell: "/bin/bash".to_string(),
            terminal_size: TerminalSize::default(),
            echo: EchoOptions::default(),
        }
    }
}

impl HarnessConfig {
    #[must_use]
    pub fn expect_timeout(&self) -> Duration {
        Duration::from_millis(self.expect_timeout_ms)
    }

    /// Resolve `path` against the base directory unless it is absolute.
    ///
    /// The result is anchored at the current directory when `base_dir` is
    /// relative, so it stays valid from any child working directory.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        let joined = self.base_dir.join(path);
        if joined.is_absolute() {
            return joined;
        }
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(joined),
            Err(err) => {
                tracing::warn!(error = %err, path = %joined.display(), "keeping relative path");
                joined
            }
        }
    }

    /// Root of the fixture repository; every child process of a script runs here.
    #[must_use]
    pub fn fixture_root(&self) -> PathBuf {
        self.resolve(&self.fixture.dir)
    }

    /// Replace a leading tool alias in a `run:` argument list with the
    /// configured command. Other argument lists are returned unchanged.
    #[must_use]
    pub fn resolve_run_command(&self, mut args: Vec<String>) -> Vec<String> {
        let Some(tool) = &self.tool else {
            return args;
        };
        if args.first() != Some(&tool.alias) {
            return args;
        }
        let mut argv = match &tool.resolution {
            ToolResolution::Interpreter {
                interpreter,
                script,
            } => vec![
                interpreter.clone(),
                self.resolve(script).display().to_string(),
            ],
            ToolResolution::Executable { path } => vec![self.resolve(path).display().to_string()],
        };
        argv.extend(args.drain(1..));
        argv
    }
}

/// Fixture repository layout and the version-control commands that reset it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    /// Fixture working directory.
    pub dir: PathBuf,
    /// Command that builds the fixture when `dir` is missing. Runs in `base_dir`.
    pub setup_command: Vec<String>,
    /// Version-control client program.
    pub vcs: String,
    /// Branch checked out at the start of every script.
    pub baseline: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("test-repo"),
            setup_command: vec!["./mk-test-repo".to_string()],
            vcs: "git".to_string(),
            baseline: "master".to_string(),
        }
    }
}

/// The tool under test and how its `run:` alias turns into a real command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// First `run:` token that selects the tool.
    pub alias: String,
    pub resolution: ToolResolution,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            alias: "ibisect".to_string(),
            resolution: ToolResolution::Interpreter {
                interpreter: "python3".to_string(),
                script: PathBuf::from("../git-ibisect"),
            },
        }
    }
}

/// Strategy for replacing the tool alias with a command line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResolution {
    /// Run `script` (relative to `base_dir`) through an interpreter program.
    Interpreter { interpreter: String, script: PathBuf },
    /// Run `path` (relative to `base_dir`) directly.
    Executable { path: PathBuf },
}

/// What the command executor prints besides failure output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EchoOptions {
    /// Print the command line before running it.
    pub show_command: bool,
    /// Print captured output even when the command succeeds.
    pub show_output: bool,
}
