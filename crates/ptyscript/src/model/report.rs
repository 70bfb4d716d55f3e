use crate::model::RunId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Exit status and merged stdout/stderr of an external command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Process exit code; `-1` when the process was terminated by a signal.
    pub status: i32,
    /// Captured output with trailing whitespace stripped.
    pub output: String,
}

impl CommandResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
    Passed,
    Failed,
}

/// Outcome of running one script file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptReport {
    pub run_id: RunId,
    pub script: PathBuf,
    pub status: ScriptStatus,
    /// Statements that completed with an `OK` line.
    pub statements_ok: usize,
    /// 1-based line number of the statement that stopped the script.
    pub failed_line: Option<usize>,
    pub duration_ms: u64,
    pub error: Option<ErrorInfo>,
}

impl ScriptReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ScriptStatus::Passed
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
}
