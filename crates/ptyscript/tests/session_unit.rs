// Test module - relaxed lint rules
#![allow(clippy::indexing_slicing)]
#![allow(clippy::panic)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

//! Session driver tests
//!
//! Drive real processes on a PTY through the idle/attached state machine.

use ptyscript::model::TerminalSize;
use ptyscript::runner::ErrorCode;
use ptyscript::session::{DriverState, Session, SessionConfig, SessionDriver};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn words(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

fn driver() -> SessionDriver {
    SessionDriver::new(None, TerminalSize::default())
}

// =============================================================================
// Spawn
// =============================================================================

#[test]
fn spawn_attaches_the_driver() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/echo", "hi"])).unwrap();
    assert_eq!(driver.state(), DriverState::Attached);
    assert_eq!(driver.session_mut().unwrap().command(), "/bin/echo hi");
}

#[test]
fn second_spawn_is_rejected_whatever_the_command() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/cat"])).unwrap();

    for argv in [words(&["/bin/cat"]), words(&["/bin/echo", "other"])] {
        let err = driver.spawn(argv).unwrap_err();
        assert_eq!(err.code, ErrorCode::ProcessRunning);
        assert_eq!(err.message, "Cannot run; process is already running.");
    }
    assert!(driver.is_attached());
}

#[test]
fn missing_program_is_io_error_and_driver_stays_idle() {
    let mut driver = driver();
    let err = driver
        .spawn(words(&["/nonexistent/ptyscript-no-such-tool"]))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Io);
    assert_eq!(driver.state(), DriverState::Idle);
}

#[test]
fn spawn_uses_the_driver_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = SessionDriver::new(Some(dir.path().to_path_buf()), TerminalSize::default());
    driver.spawn(words(&["/bin/pwd"])).unwrap();
    let expected = dir.path().canonicalize().unwrap();
    driver
        .expect_exact(expected.to_str().unwrap(), TIMEOUT)
        .unwrap();
}

// =============================================================================
// Expect
// =============================================================================

#[test]
fn expect_matches_immediate_output() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/echo", "hello world"])).unwrap();
    driver.expect_exact("hello", TIMEOUT).unwrap();
    driver.expect_exact("world", TIMEOUT).unwrap();
}

#[test]
fn matched_output_is_consumed() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/echo", "once"])).unwrap();
    driver.expect_exact("once", TIMEOUT).unwrap();
    let err = driver
        .expect_exact("once", Duration::from_millis(300))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
}

#[test]
fn expect_times_out_on_silent_process() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/cat"])).unwrap();

    let started = Instant::now();
    let err = driver
        .expect_exact("never", Duration::from_millis(200))
        .unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(err.code, ErrorCode::Timeout);
    assert!(err.message.contains("timed out"), "{}", err.message);
    let context = err.context.unwrap();
    assert_eq!(context["expected"], "never");
    assert_eq!(context["process_exited"], false);
}

#[test]
fn expect_fails_once_the_process_closes_its_output() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/echo", "hi"])).unwrap();

    let err = driver.expect_exact("bye", TIMEOUT).unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
    let context = err.context.unwrap();
    assert_eq!(context["process_exited"], true);
    assert!(context["recent_output"].as_str().unwrap().contains("hi"));
    assert!(context["screen"].as_str().unwrap().contains("hi"));
}

#[test]
fn empty_text_matches_without_output() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/cat"])).unwrap();
    driver
        .expect_exact("", Duration::from_millis(50))
        .unwrap();
}

// =============================================================================
// Send
// =============================================================================

#[test]
fn send_line_reaches_the_process() {
    let mut driver = driver();
    driver.spawn(words(&["/bin/cat"])).unwrap();
    driver.send_line("ping").unwrap();
    // Once for the terminal echo, once for cat's own output.
    driver.expect_exact("ping", TIMEOUT).unwrap();
    driver.expect_exact("ping", TIMEOUT).unwrap();
    let err = driver
        .expect_exact("ping", Duration::from_millis(200))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Timeout);
}

#[test]
fn send_line_terminates_the_line() {
    let mut driver = driver();
    driver
        .spawn(words(&["/bin/sh", "-c", "read answer; echo \"got:$answer\""]))
        .unwrap();
    driver.send_line("good").unwrap();
    driver.expect_exact("got:good", TIMEOUT).unwrap();
}

#[test]
fn send_waits_while_the_process_is_not_reading() {
    let mut driver = driver();
    driver
        .spawn(words(&["/bin/sh", "-c", "sleep 0.5; exec cat > /dev/null"]))
        .unwrap();

    // Far more than the terminal input queue holds before the reader starts.
    let line = "x".repeat(512);
    for _ in 0..512 {
        driver.send_line(&line).unwrap();
    }
    driver.send_line("last-line").unwrap();
    driver.expect_exact("last-line", TIMEOUT).unwrap();
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn session_reports_liveness() {
    let mut session = Session::spawn(SessionConfig {
        argv: words(&["/bin/cat"]),
        cwd: None,
        size: TerminalSize::default(),
    })
    .unwrap();
    assert!(session.is_alive());
    assert!(!session.output_closed());
}

#[test]
fn session_rejects_empty_command_line() {
    let result = Session::spawn(SessionConfig {
        argv: Vec::new(),
        cwd: None,
        size: TerminalSize::default(),
    });
    match result {
        Err(err) => assert_eq!(err.code, ErrorCode::InvalidStatement),
        Ok(_) => panic!("empty argv should not spawn"),
    }
}
