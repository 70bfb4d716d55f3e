//! Fixture repository lifecycle.
//!
//! The fixture is built once by an opaque setup command and then shared by
//! every script of the invocation. Instead of being isolated per script it is
//! normalized at the start of each one: any bisection left over from a
//! previous script is aborted and the baseline branch is checked out. Both
//! steps are best-effort, so normalizing an already clean fixture is a no-op.

use crate::exec::Executor;
use crate::model::HarnessConfig;
use crate::runner::{RunnerError, RunnerResult};
use std::io::Write;
use std::path::PathBuf;

pub struct FixtureManager<'a> {
    config: &'a HarnessConfig,
}

impl<'a> FixtureManager<'a> {
    #[must_use]
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    /// Fixture working directory.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.config.fixture_root()
    }

    /// Executor whose commands run inside the fixture.
    #[must_use]
    pub fn executor(&self) -> Executor {
        Executor::new(self.config.echo).in_dir(self.root())
    }

    /// Ensure the fixture exists, then normalize it. Returns the fixture root.
    ///
    /// # Errors
    /// - `E_IO`: the fixture is still missing after the setup command ran
    pub fn prepare(&self, console: &mut dyn Write) -> RunnerResult<PathBuf> {
        self.ensure(console)?;
        self.normalize(console)?;
        Ok(self.root())
    }

    /// Run the setup command if the fixture directory is missing.
    ///
    /// Returns whether the setup command ran.
    ///
    /// # Errors
    /// - `E_IO`: the fixture is still missing after the setup command ran
    pub fn ensure(&self, console: &mut dyn Write) -> RunnerResult<bool> {
        let root = self.root();
        if root.is_dir() {
            return Ok(false);
        }

        let argv = self.setup_argv();
        tracing::info!(fixture = %root.display(), setup = %argv.join(" "), "building fixture");
        Executor::new(self.config.echo)
            .in_dir(self.config.base_dir.clone())
            .best_effort(&argv, console)?;

        if root.is_dir() {
            Ok(true)
        } else {
            Err(RunnerError::io(
                format!("fixture {} is missing after setup", root.display()),
                format!("setup command `{}` did not create it", argv.join(" ")),
            ))
        }
    }

    /// Abort any bisection in progress and check out the baseline branch.
    pub fn normalize(&self, console: &mut dyn Write) -> RunnerResult<()> {
        let fixture = &self.config.fixture;
        let executor = self.executor();
        executor.best_effort(
            &[fixture.vcs.clone(), "bisect".to_string(), "reset".to_string()],
            console,
        )?;
        executor.best_effort(
            &[
                fixture.vcs.clone(),
                "checkout".to_string(),
                fixture.baseline.clone(),
            ],
            console,
        )?;
        Ok(())
    }

    /// Setup command with a path-like program resolved against the base directory.
    fn setup_argv(&self) -> Vec<String> {
        let mut argv = self.config.fixture.setup_command.clone();
        if let Some(program) = argv.first_mut() {
            if program.contains('/') {
                *program = self
                    .config
                    .resolve(std::path::Path::new(program.as_str()))
                    .display()
                    .to_string();
            }
        }
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_program_with_path_resolves_against_base_dir() {
        let mut config = HarnessConfig {
            base_dir: PathBuf::from("/srv/tests"),
            ..HarnessConfig::default()
        };
        config.fixture.setup_command = vec!["./mk-test-repo".to_string(), "--fast".to_string()];
        let argv = FixtureManager::new(&config).setup_argv();
        assert_eq!(argv, vec!["/srv/tests/./mk-test-repo", "--fast"]);
    }

    #[test]
    fn bare_setup_program_is_left_to_path_lookup() {
        let mut config = HarnessConfig::default();
        config.fixture.setup_command = vec!["make".to_string(), "fixture".to_string()];
        let argv = FixtureManager::new(&config).setup_argv();
        assert_eq!(argv, vec!["make", "fixture"]);
    }

    #[test]
    fn root_is_resolved_against_base_dir() {
        let config = HarnessConfig {
            base_dir: PathBuf::from("/srv/tests"),
            ..HarnessConfig::default()
        };
        assert_eq!(
            FixtureManager::new(&config).root(),
            PathBuf::from("/srv/tests/test-repo")
        );
    }
}
