//! Manual takeover of a session, and the fallback debug shell.

use super::Session;
use crate::runner::{RunnerError, RunnerResult};
use std::path::Path;
use std::process::Command;

/// Ctrl-], the byte that hands control back to the script.
pub const DEFAULT_ESCAPE: u8 = 0x1d;

/// Start `shell` in `cwd` on the operator's terminal and wait for it to exit.
///
/// Returns the shell's exit code (`-1` if it was killed by a signal).
///
/// # Errors
/// - `E_IO`: the shell could not be started
pub fn spawn_shell(shell: &str, cwd: &Path) -> RunnerResult<i32> {
    tracing::debug!(shell = %shell, cwd = %cwd.display(), "starting debug shell");
    let status = Command::new(shell)
        .current_dir(cwd)
        .status()
        .map_err(|err| RunnerError::io(format!("failed to start {shell}"), err))?;
    Ok(status.code().unwrap_or(-1))
}

/// Restores cooked mode when the relay returns, including on error.
struct RawModeGuard {
    enabled: bool,
}

impl RawModeGuard {
    fn enable() -> Self {
        match crossterm::terminal::enable_raw_mode() {
            Ok(()) => Self { enabled: true },
            Err(err) => {
                tracing::warn!(error = %err, "operator terminal stays in cooked mode");
                Self { enabled: false }
            }
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enabled {
            let _ = crossterm::terminal::disable_raw_mode();
        }
    }
}

#[cfg(unix)]
pub(super) fn relay(session: &mut Session, escape: u8) -> RunnerResult<()> {
    use nix::errno::Errno;
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::fd::AsFd;

    // Read the raw descriptor so no keystrokes are left behind in the
    // buffered stdin handle after detaching.
    let mut input = io::stdin()
        .as_fd()
        .try_clone_to_owned()
        .map(File::from)
        .map_err(|err| RunnerError::io("failed to open operator input", err))?;
    let mut output = io::stdout().lock();
    let write_error = |err: io::Error| RunnerError::io("failed to write to operator terminal", err);

    output.write_all(&session.take_pending()).map_err(write_error)?;
    output.flush().map_err(write_error)?;

    tracing::debug!(command = %session.command(), escape, "operator attached");
    let _raw = RawModeGuard::enable();
    let mut buffer = [0u8; 1024];

    loop {
        let chunk = session.read_available()?;
        if !chunk.is_empty() {
            output.write_all(&chunk).map_err(write_error)?;
            output.flush().map_err(write_error)?;
        }
        if session.output_closed() {
            break;
        }

        let ready = {
            let mut fds = [PollFd::new(input.as_fd(), PollFlags::POLLIN)];
            match poll(&mut fds, PollTimeout::from(10u16)) {
                Ok(_) => fds
                    .first()
                    .and_then(|fd| fd.revents())
                    .is_some_and(|events| {
                        events.intersects(PollFlags::POLLIN | PollFlags::POLLHUP)
                    }),
                Err(Errno::EINTR) => false,
                Err(err) => return Err(RunnerError::io("failed to poll operator input", err)),
            }
        };
        if !ready {
            continue;
        }

        let count = match input.read(&mut buffer) {
            Ok(count) => count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(RunnerError::io("failed to read operator input", err)),
        };
        let typed = buffer.get(..count).unwrap_or_default();
        if typed.is_empty() {
            break;
        }
        let (forward, detach) = match typed.iter().position(|&byte| byte == escape) {
            Some(idx) => (typed.get(..idx).unwrap_or_default(), true),
            None => (typed, false),
        };
        if !forward.is_empty() {
            session.write_input(forward)?;
            let echoed = session.take_pending();
            if !echoed.is_empty() {
                output.write_all(&echoed).map_err(write_error)?;
                output.flush().map_err(write_error)?;
            }
        }
        if detach {
            break;
        }
    }

    tracing::debug!(command = %session.command(), "operator detached");
    Ok(())
}

#[cfg(not(unix))]
pub(super) fn relay(session: &mut Session, escape: u8) -> RunnerResult<()> {
    let _ = (session, escape);
    Err(RunnerError::new(
        crate::runner::ErrorCode::Io,
        "interactive takeover needs a unix terminal",
    ))
}
