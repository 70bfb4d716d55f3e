//! Script files and statement parsing.
//!
//! A script is line oriented. Blank lines and lines starting with `#` are
//! skipped; every other line is `<command>:<argument text>`. The command
//! keyword decides how the argument text is kept:
//!
//! | command    | payload                                        |
//! |------------|------------------------------------------------|
//! | `checkout` | shell-split argument list                      |
//! | `run`      | shell-split argument list (at least one word)  |
//! | `expect`   | literal text                                   |
//! | `send`     | literal text                                   |
//! | `debug`    | none                                           |
//!
//! Statements are parsed lazily by [`ScriptLine::statement`] so that an
//! unknown keyword on line 10 only stops the script once line 10 is reached.

use crate::runner::{RunnerError, RunnerResult};
use std::fs;
use std::path::{Path, PathBuf};

/// First non-whitespace character of a comment line.
pub const COMMENT_MARKER: char = '#';

/// Separator between the command keyword and its argument text.
pub const COMMAND_DELIMITER: char = ':';

/// One parsed statement with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Checkout { args: Vec<String> },
    Run { args: Vec<String> },
    Expect { text: String },
    Send { text: String },
    Debug,
}

impl Statement {
    /// Parse a trimmed, non-comment line.
    ///
    /// # Errors
    /// - `E_INVALID_COMMAND`: the keyword is not one of the five statements
    /// - `E_INVALID_STATEMENT`: unbalanced quoting, or `run` without a command
    pub fn parse(line: &str) -> RunnerResult<Self> {
        let (command, rest) = line
            .split_once(COMMAND_DELIMITER)
            .unwrap_or((line, ""));
        let rest = rest.trim_start();

        match command {
            "checkout" => Ok(Self::Checkout {
                args: split_words(rest)?,
            }),
            "run" => {
                let args = split_words(rest)?;
                if args.is_empty() {
                    return Err(RunnerError::invalid_statement(
                        "run requires a command to start",
                    ));
                }
                Ok(Self::Run { args })
            }
            "expect" => Ok(Self::Expect {
                text: rest.to_string(),
            }),
            "send" => Ok(Self::Send {
                text: rest.to_string(),
            }),
            "debug" => Ok(Self::Debug),
            other => Err(RunnerError::invalid_command(other)),
        }
    }

    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Checkout { .. } => "checkout",
            Self::Run { .. } => "run",
            Self::Expect { .. } => "expect",
            Self::Send { .. } => "send",
            Self::Debug => "debug",
        }
    }
}

fn split_words(text: &str) -> RunnerResult<Vec<String>> {
    let words = shell_words::split(text).map_err(|err| {
        RunnerError::invalid_statement(format!("cannot split arguments: {err}"))
            .with_context(serde_json::json!({ "arguments": text }))
    })?;
    Ok(words.into_iter().filter(|word| !word.is_empty()).collect())
}

/// A statement line of a script, before its statement is parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number in the source file.
    pub number: usize,
    /// Line text with surrounding whitespace trimmed.
    pub text: String,
}

impl ScriptLine {
    pub fn statement(&self) -> RunnerResult<Statement> {
        Statement::parse(&self.text)
    }
}

/// Statement lines of one script file, in file order.
#[derive(Clone, Debug)]
pub struct Script {
    path: PathBuf,
    lines: Vec<ScriptLine>,
}

impl Script {
    /// Read and split a script file.
    ///
    /// # Errors
    /// - `E_IO`: the file is missing or not valid UTF-8
    pub fn load(path: &Path) -> RunnerResult<Self> {
        let source = fs::read_to_string(path).map_err(|err| {
            RunnerError::io(format!("failed to read script {}", path.display()), err)
        })?;
        Ok(Self::from_source(path, &source))
    }

    /// Split `source` into statement lines, dropping blanks and comments.
    #[must_use]
    pub fn from_source(path: &Path, source: &str) -> Self {
        let lines = source
            .lines()
            .enumerate()
            .filter_map(|(idx, raw)| {
                let text = raw.trim();
                if text.is_empty() || text.starts_with(COMMENT_MARKER) {
                    None
                } else {
                    Some(ScriptLine {
                        number: idx + 1,
                        text: text.to_string(),
                    })
                }
            })
            .collect();
        Self {
            path: path.to_path_buf(),
            lines,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }
}
