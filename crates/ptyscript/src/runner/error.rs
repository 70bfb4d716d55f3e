use crate::model::ErrorInfo;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Stable error classification shared by the library, reports and the CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Spawning, reading or writing an external process failed.
    #[serde(rename = "E_IO")]
    Io,
    /// An `expect` did not observe its text in time.
    #[serde(rename = "E_TIMEOUT")]
    Timeout,
    /// `expect`/`send` without an attached process.
    #[serde(rename = "E_NO_PROCESS")]
    NoProcess,
    /// `run` while a process is already attached.
    #[serde(rename = "E_PROCESS_RUNNING")]
    ProcessRunning,
    /// Unrecognized statement keyword.
    #[serde(rename = "E_INVALID_COMMAND")]
    InvalidCommand,
    /// Recognized keyword with unusable arguments.
    #[serde(rename = "E_INVALID_STATEMENT")]
    InvalidStatement,
    #[serde(rename = "E_CONFIG")]
    Config,
    #[serde(rename = "E_CLI_INVALID_ARG")]
    CliInvalidArg,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Io => "E_IO",
            Self::Timeout => "E_TIMEOUT",
            Self::NoProcess => "E_NO_PROCESS",
            Self::ProcessRunning => "E_PROCESS_RUNNING",
            Self::InvalidCommand => "E_INVALID_COMMAND",
            Self::InvalidStatement => "E_INVALID_STATEMENT",
            Self::Config => "E_CONFIG",
            Self::CliInvalidArg => "E_CLI_INVALID_ARG",
        }
    }

    /// Precondition violations detected before any process handle is touched.
    #[must_use]
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            Self::NoProcess | Self::ProcessRunning | Self::InvalidCommand | Self::InvalidStatement
        )
    }

    /// Process exit code used by the CLI when this error ends the invocation.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::NoProcess
            | Self::ProcessRunning
            | Self::InvalidCommand
            | Self::InvalidStatement => 2,
            Self::Io => 3,
            Self::Timeout => 4,
            Self::Config => 5,
            Self::CliInvalidArg => 6,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error, Diagnostic)]
#[error("{code}: {message}")]
pub struct RunnerError {
    pub code: ErrorCode,
    pub message: String,
    pub context: Option<Value>,
}

impl RunnerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    pub fn io(message: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Io, message)
            .with_context(serde_json::json!({ "source": err.to_string() }))
    }

    pub fn timeout(message: impl Into<String>, context: impl Into<Option<Value>>) -> Self {
        Self {
            code: ErrorCode::Timeout,
            message: message.into(),
            context: context.into(),
        }
    }

    pub fn no_process() -> Self {
        Self::new(ErrorCode::NoProcess, "No process has been run yet.")
    }

    pub fn process_running() -> Self {
        Self::new(
            ErrorCode::ProcessRunning,
            "Cannot run; process is already running.",
        )
    }

    pub fn invalid_command(command: &str) -> Self {
        Self::new(
            ErrorCode::InvalidCommand,
            format!("invalid command: {command}"),
        )
    }

    pub fn invalid_statement(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidStatement, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, message)
    }

    pub fn cli_invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CliInvalidArg, message)
    }

    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.code.is_structural()
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code.as_str().to_string(),
            message: self.message.clone(),
            context: self.context.clone(),
        }
    }
}
