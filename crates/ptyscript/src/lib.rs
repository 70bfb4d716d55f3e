//! ptyscript: replay line-oriented expect/send scripts against interactive tools.
//!
//! A script describes repository checkouts, process invocations, expected
//! terminal output and simulated keyboard input. Each script runs against a
//! fixture repository that is normalized before the first statement, and
//! drives at most one process attached to a pseudo-terminal.
//!
//! ```text
//! # bisect between two known commits
//! checkout: master
//! run: ibisect
//! expect: good or bad?
//! send: good
//! ```

#![forbid(unsafe_code)]
// Library documentation is in progress. Public API types have docs;
// internal helpers will be documented as they stabilise.
#![allow(missing_docs)]

pub mod config;
pub mod exec;
pub mod fixture;
pub mod model;
pub mod runner;
pub mod script;
pub mod session;
pub mod terminal;

pub use crate::model::*;

pub mod run {
    use super::runner::{Interpreter, RunnerResult};
    use super::{HarnessConfig, ScriptReport};
    use std::io::Write;
    use std::path::PathBuf;

    /// Run every script in order against one fixture, writing the console
    /// transcript to `console`.
    pub fn run_scripts<W: Write>(
        config: HarnessConfig,
        scripts: &[PathBuf],
        console: W,
    ) -> RunnerResult<Vec<ScriptReport>> {
        let mut interpreter = Interpreter::new(config, console);
        interpreter.run_all(scripts)
    }
}
