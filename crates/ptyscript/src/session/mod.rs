//! PTY sessions and the single-session driver.
//!
//! [`Session`] owns one process attached to a pseudo-terminal and implements
//! the expect/send protocol against it. [`SessionDriver`] is the state
//! machine a script talks to: it is either idle or attached to exactly one
//! session, and every operation checks that precondition before touching a
//! process handle.
//!
//! ```no_run
//! use ptyscript::model::TerminalSize;
//! use ptyscript::session::SessionDriver;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), ptyscript::runner::RunnerError> {
//! let mut driver = SessionDriver::new(None, TerminalSize::default());
//! driver.spawn(vec!["/bin/cat".to_string()])?;
//! driver.send_line("hello")?;
//! driver.expect_exact("hello", Duration::from_secs(1))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Process lifetime
//!
//! There is no terminate operation. A session ends when its process closes
//! its output or when the driver is dropped, which closes the PTY master.

mod interact;

pub use interact::{spawn_shell, DEFAULT_ESCAPE};

use crate::model::TerminalSize;
use crate::runner::{RunnerError, RunnerResult};
use crate::terminal::Terminal;
#[cfg(unix)]
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Bytes of unmatched output attached to a failed expectation.
const FAILURE_OUTPUT_TAIL: usize = 2048;
/// Pause between reads when the PTY has nothing buffered.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(5);
const READ_CHUNK: usize = 4096;
/// How long a write may wait for the process to make room in its input queue.
const INPUT_STALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for spawning a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Working directory of the process.
    pub cwd: Option<PathBuf>,
    /// Initial terminal size.
    pub size: TerminalSize,
}

/// A process attached to a pseudo-terminal.
pub struct Session {
    command: String,
    // Kept so the PTY stays open for the lifetime of the session.
    _master: Box<dyn portable_pty::MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader: Box<dyn Read + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    terminal: Terminal,
    /// Output read but not yet consumed by a match.
    pending: Vec<u8>,
    eof: bool,
}

impl Session {
    /// Spawn `config.argv` on a fresh PTY.
    ///
    /// # Errors
    /// - `E_INVALID_STATEMENT`: empty command line
    /// - `E_IO`: PTY creation or command spawn failed
    pub fn spawn(config: SessionConfig) -> RunnerResult<Self> {
        let (program, args) = config
            .argv
            .split_first()
            .ok_or_else(|| RunnerError::invalid_statement("run requires a command to start"))?;

        let system = native_pty_system();
        let pair = system
            .openpty(PtySize {
                rows: config.size.rows,
                cols: config.size.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|err| RunnerError::io("failed to open pty", err))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        if let Some(cwd) = &config.cwd {
            cmd.cwd(cwd);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|err| RunnerError::io(format!("failed to spawn {program}"), err))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|err| RunnerError::io("failed to clone pty reader", err))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|err| RunnerError::io("failed to take pty writer", err))?;

        #[cfg(unix)]
        {
            if let Some(fd) = pair.master.as_raw_fd() {
                let flags = OFlag::from_bits_truncate(
                    fcntl(fd, FcntlArg::F_GETFL)
                        .map_err(|err| RunnerError::io("failed to get fd flags", err))?,
                );
                fcntl(fd, FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
                    .map_err(|err| RunnerError::io("failed to set nonblocking", err))?;
            }
        }

        let command = config.argv.join(" ");
        tracing::debug!(command = %command, pid = ?child.process_id(), "session spawned");

        Ok(Self {
            command,
            _master: pair.master,
            writer,
            reader,
            child,
            terminal: Terminal::new(&config.size),
            pending: Vec::new(),
            eof: false,
        })
    }

    /// Command line the session was started with.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether the process has closed its side of the terminal.
    #[must_use]
    pub fn output_closed(&self) -> bool {
        self.eof
    }

    /// Whether the process has not exited yet.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Block until `text` appears in output not consumed by an earlier match.
    ///
    /// A match consumes the output up to and including `text`. An empty
    /// `text` matches immediately.
    ///
    /// # Errors
    /// - `E_TIMEOUT`: `timeout` elapsed, or the process closed its output
    ///   without printing `text`
    /// - `E_IO`: reading the PTY failed
    pub fn expect_exact(&mut self, text: &str, timeout: Duration) -> RunnerResult<()> {
        let needle = text.as_bytes();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(end) = find_subsequence(&self.pending, needle) {
                self.pending.drain(..end);
                tracing::debug!(expected = %text, "expectation matched");
                return Ok(());
            }
            if self.eof || Instant::now() >= deadline {
                return Err(self.expect_failure(text, timeout));
            }
            let chunk = self.read_available()?;
            if chunk.is_empty() {
                if !self.eof {
                    std::thread::sleep(READ_POLL_INTERVAL);
                }
            } else {
                self.pending.extend_from_slice(&chunk);
            }
        }
    }

    /// Write `text` followed by a newline to the process.
    ///
    /// # Errors
    /// - `E_IO`: the PTY could not be written
    pub fn send_line(&mut self, text: &str) -> RunnerResult<()> {
        tracing::debug!(text = %text, "sending line");
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        self.write_input(&line)
    }

    /// Write `bytes` to the process, waiting while its input queue is full.
    ///
    /// The master descriptor is nonblocking, so a full queue shows up as
    /// `WouldBlock`. Output is drained into the pending buffer meanwhile so
    /// terminal echo cannot stall the process.
    fn write_input(&mut self, mut bytes: &[u8]) -> RunnerResult<()> {
        let deadline = Instant::now() + INPUT_STALL_TIMEOUT;
        while !bytes.is_empty() {
            match self.writer.write(bytes) {
                Ok(0) => {
                    return Err(RunnerError::io(
                        "failed to write to process",
                        "terminal accepted no input",
                    ))
                }
                Ok(count) => bytes = bytes.get(count..).unwrap_or_default(),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(RunnerError::io(
                            "failed to write to process",
                            format!(
                                "input queue stayed full for {}s",
                                INPUT_STALL_TIMEOUT.as_secs()
                            ),
                        ));
                    }
                    let chunk = self.read_available()?;
                    self.pending.extend_from_slice(&chunk);
                    std::thread::sleep(READ_POLL_INTERVAL);
                }
                Err(err) => return Err(RunnerError::io("failed to write to process", err)),
            }
        }
        loop {
            match self.writer.flush() {
                Ok(()) => return Ok(()),
                Err(err)
                    if matches!(
                        err.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                    ) =>
                {
                    if Instant::now() >= deadline {
                        return Err(RunnerError::io("failed to flush process input", err));
                    }
                    std::thread::sleep(READ_POLL_INTERVAL);
                }
                Err(err) => return Err(RunnerError::io("failed to flush process input", err)),
            }
        }
    }

    /// Hand the session to the operator's terminal until `escape` is typed.
    ///
    /// # Errors
    /// - `E_IO`: terminal or PTY I/O failed
    pub fn interact(&mut self, escape: u8) -> RunnerResult<()> {
        interact::relay(self, escape)
    }

    /// Drain whatever the PTY has buffered without blocking.
    ///
    /// Every byte also goes through the terminal emulator.
    fn read_available(&mut self) -> RunnerResult<Vec<u8>> {
        let mut total = Vec::new();
        if self.eof {
            return Ok(total);
        }
        let mut buffer = [0u8; READ_CHUNK];
        loop {
            match self.reader.read(&mut buffer) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(count) => total.extend_from_slice(buffer.get(..count).unwrap_or_default()),
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) if is_pty_hangup(&err) => {
                    self.eof = true;
                    break;
                }
                Err(err) => return Err(RunnerError::io("failed to read pty", err)),
            }
        }
        if self.eof {
            tracing::debug!(command = %self.command, "session output closed");
        }
        self.terminal.process_bytes(&total);
        Ok(total)
    }

    fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    fn expect_failure(&self, text: &str, timeout: Duration) -> RunnerError {
        let message = if self.eof {
            format!("process closed its output before {text:?} appeared")
        } else {
            format!(
                "timed out after {:.1}s waiting for {text:?}",
                timeout.as_secs_f64()
            )
        };
        let tail_start = self.pending.len().saturating_sub(FAILURE_OUTPUT_TAIL);
        let recent = String::from_utf8_lossy(self.pending.get(tail_start..).unwrap_or_default());
        RunnerError::timeout(
            message,
            serde_json::json!({
                "expected": text,
                "timeout_ms": u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "process_exited": self.eof,
                "recent_output": recent,
                "screen": self.terminal.snapshot().text(),
            }),
        )
    }
}

/// End offset of the first occurrence of `needle` in `haystack`.
fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|start| start + needle.len())
}

/// Linux reports a closed slave side as `EIO` rather than a zero-length read.
fn is_pty_hangup(err: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::EIO as i32)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

/// Observable state of a [`SessionDriver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Attached,
}

/// Owns at most one session for the duration of a script.
pub struct SessionDriver {
    session: Option<Session>,
    cwd: Option<PathBuf>,
    size: TerminalSize,
}

impl SessionDriver {
    /// An idle driver that starts processes in `cwd` on a terminal of `size`.
    #[must_use]
    pub fn new(cwd: Option<PathBuf>, size: TerminalSize) -> Self {
        Self {
            session: None,
            cwd,
            size,
        }
    }

    #[must_use]
    pub fn state(&self) -> DriverState {
        if self.session.is_some() {
            DriverState::Attached
        } else {
            DriverState::Idle
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.state() == DriverState::Attached
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut()
    }

    /// Start `argv` and attach to it.
    ///
    /// # Errors
    /// - `E_PROCESS_RUNNING`: a session is already attached
    /// - `E_IO`: the process could not be started
    pub fn spawn(&mut self, argv: Vec<String>) -> RunnerResult<()> {
        if self.session.is_some() {
            return Err(RunnerError::process_running());
        }
        let session = Session::spawn(SessionConfig {
            argv,
            cwd: self.cwd.clone(),
            size: self.size.clone(),
        })?;
        self.session = Some(session);
        Ok(())
    }

    /// See [`Session::expect_exact`].
    ///
    /// # Errors
    /// - `E_NO_PROCESS`: nothing attached
    pub fn expect_exact(&mut self, text: &str, timeout: Duration) -> RunnerResult<()> {
        self.attached()?.expect_exact(text, timeout)
    }

    /// See [`Session::send_line`].
    ///
    /// # Errors
    /// - `E_NO_PROCESS`: nothing attached
    pub fn send_line(&mut self, text: &str) -> RunnerResult<()> {
        self.attached()?.send_line(text)
    }

    /// See [`Session::interact`].
    ///
    /// # Errors
    /// - `E_NO_PROCESS`: nothing attached
    pub fn interact(&mut self, escape: u8) -> RunnerResult<()> {
        self.attached()?.interact(escape)
    }

    fn attached(&mut self) -> RunnerResult<&mut Session> {
        self.session.as_mut().ok_or_else(RunnerError::no_process)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_subsequence_returns_end_of_match() {
        assert_eq!(find_subsequence(b"say hi there", b"hi"), Some(6));
        assert_eq!(find_subsequence(b"say hi there", b"bye"), None);
        assert_eq!(find_subsequence(b"hi", b"hi!"), None);
    }

    #[test]
    fn empty_needle_matches_immediately() {
        assert_eq!(find_subsequence(b"", b""), Some(0));
        assert_eq!(find_subsequence(b"abc", b""), Some(0));
    }

    #[test]
    fn idle_driver_rejects_session_operations() {
        let mut driver = SessionDriver::new(None, TerminalSize::default());
        assert_eq!(driver.state(), DriverState::Idle);
        let err = driver
            .expect_exact("hi", Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err.message, "No process has been run yet.");
        assert!(driver.send_line("hi").unwrap_err().is_structural());
        assert!(driver.interact(DEFAULT_ESCAPE).unwrap_err().is_structural());
        assert!(driver.session_mut().is_none());
    }
}
