use serde::{Deserialize, Serialize};

/// Terminal dimensions in rows and columns.
///
/// Default is 24 rows by 80 columns (standard VT100 size).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { rows: 24, cols: 80 }
    }
}

/// Cursor position, 0-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
}

/// Rendered screen of a session at the moment it was captured.
///
/// Attached to expectation failures so the report shows what the tool
/// actually displayed rather than a raw escape-sequence stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSnapshot {
    /// Number of rows in the terminal.
    pub rows: u16,
    /// Number of columns in the terminal.
    pub cols: u16,
    /// Cursor position.
    pub cursor: Cursor,
    /// Text lines (one per row, trailing spaces trimmed).
    pub lines: Vec<String>,
}

impl ScreenSnapshot {
    /// Screen text with trailing blank rows dropped.
    #[must_use]
    pub fn text(&self) -> String {
        let used = self
            .lines
            .iter()
            .rposition(|line| !line.trim().is_empty())
            .map_or(0, |idx| idx + 1);
        self.lines
            .iter()
            .take(used)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
