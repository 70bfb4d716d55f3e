//! ptyscript CLI: replay expect/send scripts against an interactive tool.
//!
//! Every positional argument is a script file. Scripts run in order against
//! one shared fixture; a failing script never prevents the next one from
//! running.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{ArgAction, Parser, ValueEnum};
use miette::{IntoDiagnostic, Result};
use ptyscript::config::{load_config_file, validate_config};
use ptyscript::model::{HarnessConfig, ScriptReport};
use ptyscript::run::run_scripts;
use ptyscript::runner::RunnerError;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: ptyscript test-foo.txt [test-bar.txt ...]";

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "ptyscript",
    version,
    about = "Replay expect/send scripts against an interactive tool"
)]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorMode,
    /// Harness configuration file (JSON, or YAML by extension)
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, help = "Override the fixture directory")]
    fixture_dir: Option<PathBuf>,
    #[arg(long, help = "Override the expect timeout in milliseconds")]
    timeout_ms: Option<u64>,
    #[arg(long, help = "Echo external commands and their output")]
    show_commands: bool,
    #[arg(
        long,
        help = "Print one JSON report per script on stdout (transcript goes to stderr)"
    )]
    json: bool,
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(long, short = 'v', action = ArgAction::Count)]
    verbose: u8,
    /// Script files to run, in order
    scripts: Vec<PathBuf>,
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // Respect NO_COLOR environment variable
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
}

/// Logs go to stderr so stdout carries only the transcript or JSON reports.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_colors(cli.color);
    init_tracing(cli.verbose);

    if cli.scripts.is_empty() {
        println!("{USAGE}");
        std::process::exit(1);
    }

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(err) => exit_with_error(err),
    };
    tracing::debug!(
        scripts = cli.scripts.len(),
        fixture = %config.fixture_root().display(),
        timeout_ms = config.expect_timeout_ms,
        "harness configured"
    );

    let reports = if cli.json {
        let reports = run_scripts(config, &cli.scripts, io::stderr()).into_diagnostic()?;
        emit_reports(&reports)?;
        reports
    } else {
        run_scripts(config, &cli.scripts, io::stdout()).into_diagnostic()?
    };

    if reports.iter().all(ScriptReport::passed) {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn build_config(cli: &Cli) -> Result<HarnessConfig, RunnerError> {
    let mut config = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = &cli.fixture_dir {
        config.fixture.dir.clone_from(dir);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.expect_timeout_ms = timeout_ms;
    }
    if cli.show_commands {
        config.echo.show_command = true;
        config.echo.show_output = true;
    }
    validate_config(&config).map_err(|err| {
        RunnerError::cli_invalid_arg(err.message).with_context(serde_json::json!({
            "config": cli.config.as_ref().map(|path| path.display().to_string()),
        }))
    })?;
    Ok(config)
}

fn emit_reports(reports: &[ScriptReport]) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for report in reports {
        let line = serde_json::to_string(report).into_diagnostic()?;
        writeln!(out, "{line}").into_diagnostic()?;
    }
    out.flush().into_diagnostic()
}

fn exit_with_error(err: RunnerError) -> ! {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ptyscript").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let cli = parse(&[
            "--timeout-ms",
            "250",
            "--fixture-dir",
            "repo",
            "--show-commands",
            "t.txt",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.expect_timeout_ms, 250);
        assert_eq!(config.fixture.dir, PathBuf::from("repo"));
        assert!(config.echo.show_command);
        assert!(config.echo.show_output);
    }

    #[test]
    fn zero_timeout_is_a_cli_error() {
        let cli = parse(&["--timeout-ms", "0", "t.txt"]);
        let err = build_config(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn scripts_keep_their_order() {
        let cli = parse(&["b.txt", "a.txt"]);
        assert_eq!(cli.scripts, vec![PathBuf::from("b.txt"), PathBuf::from("a.txt")]);
    }
}
