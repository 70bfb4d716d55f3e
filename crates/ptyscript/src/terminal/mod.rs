//! Terminal emulation for session diagnostics.
//!
//! Wraps the `vt100` crate. Sessions feed every byte they read through a
//! [`Terminal`] so that a failed expectation can report the screen the tool
//! actually drew, with cursor movement and clearing already applied.
//!
//! ```
//! use ptyscript::terminal::Terminal;
//! use ptyscript::model::TerminalSize;
//!
//! let mut terminal = Terminal::new(&TerminalSize { rows: 24, cols: 80 });
//! terminal.process_bytes(b"first\r\n\x1b[2J\x1b[Hsecond\r\n");
//! assert_eq!(terminal.snapshot().text(), "second");
//! ```

use crate::model::{Cursor, ScreenSnapshot, TerminalSize};
use vt100::Parser;

/// Terminal emulator wrapper using vt100.
pub struct Terminal {
    parser: Parser,
}

impl Terminal {
    /// Create a new terminal with the given size.
    #[must_use]
    pub fn new(size: &TerminalSize) -> Self {
        Self {
            parser: Parser::new(size.rows, size.cols, 0),
        }
    }

    /// Process incoming bytes.
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        self.parser.process(bytes);
    }

    /// Capture the current screen contents.
    #[must_use]
    pub fn snapshot(&self) -> ScreenSnapshot {
        let screen = self.parser.screen();
        let (rows, cols) = screen.size();
        let lines = screen
            .rows(0, cols)
            .map(|line| line.trim_end().to_string())
            .collect();
        let (row, col) = screen.cursor_position();
        ScreenSnapshot {
            rows,
            cols,
            cursor: Cursor { row, col },
            lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_has_one_line_per_row() {
        let terminal = Terminal::new(&TerminalSize { rows: 5, cols: 20 });
        let snapshot = terminal.snapshot();
        assert_eq!(snapshot.rows, 5);
        assert_eq!(snapshot.cols, 20);
        assert_eq!(snapshot.lines.len(), 5);
        assert_eq!(snapshot.text(), "");
    }

    #[test]
    fn escape_sequences_are_applied() {
        let mut terminal = Terminal::new(&TerminalSize::default());
        terminal.process_bytes(b"abc\x1b[1Dx\r\nnext");
        let snapshot = terminal.snapshot();
        assert_eq!(snapshot.text(), "abx\nnext");
        assert_eq!(snapshot.cursor, Cursor { row: 1, col: 4 });
    }
}
