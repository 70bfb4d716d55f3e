//! Run external commands to completion with merged output.
//!
//! Every invocation goes through [`Executor::invoke`]; callers pick a
//! [`FailurePolicy`] instead of handling non-zero exits themselves:
//!
//! - [`FailurePolicy::Ignore`] for idempotent setup steps whose failure is
//!   expected (resetting a bisection that is not active). Failure output is
//!   still printed so the operator sees it.
//! - [`FailurePolicy::Return`] for callers that branch on the exit status.
//!
//! Captured output always has trailing whitespace stripped.

use crate::model::{CommandResult, EchoOptions};
use crate::runner::{RunnerError, RunnerResult};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Prefix for each line of captured output written to the console.
pub const OUTPUT_MARKER: &str = "> ";

/// How a non-zero exit is surfaced to the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Print the failure output and carry on.
    Ignore,
    /// Hand the exit status back untouched.
    Return,
}

/// Write `output` to the console with every line prefixed by [`OUTPUT_MARKER`].
pub fn print_output(console: &mut dyn Write, output: &str) -> RunnerResult<()> {
    if output.is_empty() {
        return Ok(());
    }
    for line in output.lines() {
        writeln!(console, "{OUTPUT_MARKER}{line}").map_err(console_error)?;
    }
    Ok(())
}

pub(crate) fn console_error(err: std::io::Error) -> RunnerError {
    RunnerError::io("failed to write console output", err)
}

/// Runs commands in a fixed working directory with fixed echo settings.
#[derive(Clone, Debug, Default)]
pub struct Executor {
    cwd: Option<PathBuf>,
    echo: EchoOptions,
}

impl Executor {
    #[must_use]
    pub fn new(echo: EchoOptions) -> Self {
        Self { cwd: None, echo }
    }

    /// Run every command in `dir` instead of the harness's own directory.
    #[must_use]
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Best-effort run: returns the output on success and `None` on failure.
    ///
    /// Failing to start the program counts as a failure, not an error. Only
    /// console write errors propagate.
    pub fn best_effort(
        &self,
        argv: &[String],
        console: &mut dyn Write,
    ) -> RunnerResult<Option<String>> {
        let result = self.invoke(argv, FailurePolicy::Ignore, console)?;
        Ok(result.success().then_some(result.output))
    }

    /// Status-returning run: the caller gets `(status, output)` for any exit.
    pub fn status(&self, argv: &[String], console: &mut dyn Write) -> RunnerResult<CommandResult> {
        self.invoke(argv, FailurePolicy::Return, console)
    }

    /// Execute `argv` and apply `policy` to the outcome.
    ///
    /// # Errors
    /// - `E_IO`: the program could not be started (only with
    ///   [`FailurePolicy::Return`]) or the console could not be written.
    pub fn invoke(
        &self,
        argv: &[String],
        policy: FailurePolicy,
        console: &mut dyn Write,
    ) -> RunnerResult<CommandResult> {
        if self.echo.show_command || self.echo.show_output {
            writeln!(console, "{}", argv.join(" ")).map_err(console_error)?;
        }

        let result = match self.capture(argv) {
            Ok(result) => result,
            Err(err) => match policy {
                FailurePolicy::Ignore => {
                    tracing::debug!(
                        command = %argv.join(" "),
                        error = %err,
                        "ignoring spawn failure"
                    );
                    let output = format!("{}: {}", err.message, describe_source(&err));
                    print_output(console, &output)?;
                    return Ok(CommandResult { status: -1, output });
                }
                FailurePolicy::Return => return Err(err),
            },
        };

        tracing::debug!(
            command = %argv.join(" "),
            status = result.status,
            "command finished"
        );

        if result.success() {
            if self.echo.show_output {
                print_output(console, &result.output)?;
            }
        } else {
            match policy {
                FailurePolicy::Ignore => print_output(console, &result.output)?,
                FailurePolicy::Return if self.echo.show_output => {
                    print_output(console, &result.output)?;
                }
                FailurePolicy::Return => {}
            }
        }
        Ok(result)
    }

    fn capture(&self, argv: &[String]) -> RunnerResult<CommandResult> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RunnerError::invalid_statement("empty command line"))?;

        let (mut reader, writer) =
            std::io::pipe().map_err(|err| RunnerError::io("failed to create pipe", err))?;
        let stderr = writer
            .try_clone()
            .map_err(|err| RunnerError::io("failed to clone pipe", err))?;

        // The command holds pipe ends until dropped; release them before
        // reading or the read never sees EOF.
        let mut child = {
            let mut command = Command::new(program);
            command
                .args(args)
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr);
            if let Some(cwd) = &self.cwd {
                command.current_dir(cwd);
            }
            command
                .spawn()
                .map_err(|err| RunnerError::io(format!("failed to run {program}"), err))?
        };

        let mut raw = Vec::new();
        reader
            .read_to_end(&mut raw)
            .map_err(|err| RunnerError::io("failed to read command output", err))?;
        let status = child
            .wait()
            .map_err(|err| RunnerError::io("failed to wait for command", err))?;

        Ok(CommandResult {
            status: status.code().unwrap_or(-1),
            output: String::from_utf8_lossy(&raw).trim_end().to_string(),
        })
    }
}

fn describe_source(err: &RunnerError) -> String {
    err.context
        .as_ref()
        .and_then(|context| context.get("source"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown error")
        .to_string()
}
