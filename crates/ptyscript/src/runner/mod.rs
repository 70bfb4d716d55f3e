//! Script interpreter.
//!
//! [`Interpreter`] runs scripts one after another. For every script it
//! prepares the fixture, creates a fresh idle [`SessionDriver`] and dispatches
//! statements in file order, printing an `OK` line after each one. The first
//! statement that fails stops that script only; the next script starts from a
//! normalized fixture regardless.

mod error;

pub use error::{ErrorCode, RunnerError, RunnerResult};

use crate::exec::{console_error, print_output};
use crate::fixture::FixtureManager;
use crate::model::{HarnessConfig, RunId, ScriptReport, ScriptStatus};
use crate::script::{Script, ScriptLine, Statement};
use crate::session::{spawn_shell, SessionDriver, DEFAULT_ESCAPE};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Replays scripts and writes the transcript to a console.
pub struct Interpreter<W: Write> {
    config: HarnessConfig,
    console: W,
}

impl<W: Write> Interpreter<W> {
    pub fn new(config: HarnessConfig, console: W) -> Self {
        Self { config, console }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn into_console(self) -> W {
        self.console
    }

    /// Run every script in order, each to completion.
    ///
    /// # Errors
    /// - `E_IO`: the console could not be written
    pub fn run_all(&mut self, scripts: &[PathBuf]) -> RunnerResult<Vec<ScriptReport>> {
        scripts.iter().map(|path| self.run_script(path)).collect()
    }

    /// Run one script. Script failures are part of the returned report.
    ///
    /// # Errors
    /// - `E_IO`: the console could not be written
    pub fn run_script(&mut self, path: &Path) -> RunnerResult<ScriptReport> {
        let mut run = ScriptRun::start(path);
        let span = tracing::info_span!("script", run_id = %run.run_id, script = %path.display());
        let _entered = span.enter();

        let root = match FixtureManager::new(&self.config).prepare(&mut self.console) {
            Ok(root) => root,
            Err(err) => {
                self.print_error(&err, path, None)?;
                return Ok(run.failed(None, &err));
            }
        };

        writeln!(self.console, "Running tests: {}", path.display()).map_err(console_error)?;

        let script = match Script::load(path) {
            Ok(script) => script,
            Err(err) => {
                self.print_error(&err, path, None)?;
                return Ok(run.failed(None, &err));
            }
        };

        let mut driver = SessionDriver::new(Some(root.clone()), self.config.terminal_size.clone());
        for line in script.lines() {
            match self.execute(line, &mut driver, &root) {
                Ok(()) => {
                    writeln!(self.console, "  {}: OK!", line.text).map_err(console_error)?;
                    run.statements_ok += 1;
                }
                Err(err) => {
                    tracing::warn!(line = line.number, code = %err.code, "script stopped");
                    self.print_error(&err, path, Some(line))?;
                    return Ok(run.failed(Some(line.number), &err));
                }
            }
        }

        tracing::info!(statements = run.statements_ok, "script passed");
        Ok(run.passed())
    }

    fn execute(
        &mut self,
        line: &ScriptLine,
        driver: &mut SessionDriver,
        root: &Path,
    ) -> RunnerResult<()> {
        let statement = line.statement()?;
        tracing::debug!(line = line.number, statement = statement.keyword(), "dispatching");

        match statement {
            Statement::Checkout { args } => {
                let mut argv = vec![self.config.fixture.vcs.clone(), "checkout".to_string()];
                argv.extend(args);
                FixtureManager::new(&self.config)
                    .executor()
                    .best_effort(&argv, &mut self.console)?;
            }
            Statement::Run { args } => {
                driver.spawn(self.config.resolve_run_command(args))?;
            }
            Statement::Expect { text } => {
                driver.expect_exact(&text, self.config.expect_timeout())?;
            }
            Statement::Send { text } => {
                driver.send_line(&text)?;
            }
            Statement::Debug => {
                writeln!(self.console, "\ndebug: entering interactive mode...\n")
                    .and_then(|()| self.console.flush())
                    .map_err(console_error)?;
                if driver.is_attached() {
                    driver.interact(DEFAULT_ESCAPE)?;
                } else {
                    spawn_shell(&self.config.debug_shell, root)?;
                }
            }
        }
        Ok(())
    }

    fn print_error(
        &mut self,
        err: &RunnerError,
        path: &Path,
        line: Option<&ScriptLine>,
    ) -> RunnerResult<()> {
        writeln!(self.console, "ERROR: {}", err.message).map_err(console_error)?;
        writeln!(self.console, "In: {}", path.display()).map_err(console_error)?;
        if let Some(line) = line {
            writeln!(self.console, "  {}: {}", line.number, line.text).map_err(console_error)?;
        }
        if let Some(screen) = err
            .context
            .as_ref()
            .and_then(|context| context.get("screen"))
            .and_then(serde_json::Value::as_str)
        {
            print_output(&mut self.console, screen)?;
        }
        Ok(())
    }
}

/// Bookkeeping for the report of the script being run.
struct ScriptRun {
    run_id: RunId,
    script: PathBuf,
    started: Instant,
    statements_ok: usize,
}

impl ScriptRun {
    fn start(path: &Path) -> Self {
        Self {
            run_id: RunId::new(),
            script: path.to_path_buf(),
            started: Instant::now(),
            statements_ok: 0,
        }
    }

    fn passed(self) -> ScriptReport {
        self.finish(ScriptStatus::Passed, None, None)
    }

    fn failed(self, line: Option<usize>, err: &RunnerError) -> ScriptReport {
        self.finish(ScriptStatus::Failed, line, Some(err))
    }

    fn finish(
        self,
        status: ScriptStatus,
        failed_line: Option<usize>,
        err: Option<&RunnerError>,
    ) -> ScriptReport {
        ScriptReport {
            run_id: self.run_id,
            script: self.script,
            status,
            statements_ok: self.statements_ok,
            failed_line,
            duration_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            error: err.map(RunnerError::to_error_info),
        }
    }
}
