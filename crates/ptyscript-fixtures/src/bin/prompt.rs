//! Interactive fixture: asks a question and echoes every answer.
//! Quits on `quit` or end of input.

#![allow(clippy::print_stdout)] // Fixtures must print to the terminal

use std::io::{self, BufRead, Write};

const PROMPT: &str = "good or bad? ";

fn main() -> io::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    write!(stdout, "{PROMPT}")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        let answer = line.trim();
        if answer == "quit" {
            writeln!(stdout, "bye")?;
            break;
        }
        writeln!(stdout, "got: {answer}")?;
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;
    }
    stdout.flush()
}
