//! Version-control stand-in: appends its arguments to `vcs.log` in the
//! current directory and succeeds, except for `checkout missing-branch`.

#![allow(clippy::print_stderr)]

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> io::Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let line = args.join(" ");

    let mut log = OpenOptions::new()
        .create(true)
        .append(true)
        .open("vcs.log")?;
    writeln!(log, "{line}")?;

    if line == "checkout missing-branch" {
        eprintln!("error: pathspec 'missing-branch' did not match");
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
