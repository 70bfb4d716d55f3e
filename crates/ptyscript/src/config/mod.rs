use crate::model::{HarnessConfig, ToolResolution};
use crate::runner::{RunnerError, RunnerResult};
use std::fs;
use std::path::Path;

const MIN_TERMINAL_SIZE: u16 = 1;
const MAX_TERMINAL_SIZE: u16 = 500;

/// Load a harness configuration from a JSON or YAML file.
///
/// YAML is chosen by a `.yaml`/`.yml` extension, JSON otherwise. A relative
/// `base_dir` (including the default `.`) is taken relative to the directory
/// containing the file.
///
/// # Errors
/// - `E_IO`: the file cannot be read
/// - `E_CONFIG`: the file does not parse or fails validation
pub fn load_config_file(path: &Path) -> RunnerResult<HarnessConfig> {
    let data = fs::read_to_string(path)
        .map_err(|err| RunnerError::io("failed to read config file", err))?;
    let mut config = parse_config(path, &data)?;
    if config.base_dir.is_relative() {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        config.base_dir = parent.join(&config.base_dir);
    }
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(path: &Path, data: &str) -> RunnerResult<HarnessConfig> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == "yaml" || ext == "yml");
    let parsed = if is_yaml {
        serde_yml::from_str(data).map_err(|err| err.to_string())
    } else {
        serde_json::from_str(data).map_err(|err| err.to_string())
    };
    parsed.map_err(|source| {
        RunnerError::config(format!("failed to parse config {}", path.display()))
            .with_context(serde_json::json!({ "source": source }))
    })
}

/// Reject configurations that cannot run a single script.
///
/// # Errors
/// - `E_CONFIG`: a required program is empty, the timeout is zero, or the
///   terminal size is out of bounds
pub fn validate_config(config: &HarnessConfig) -> RunnerResult<()> {
    if config.expect_timeout_ms == 0 {
        return Err(RunnerError::config("expect_timeout_ms must be greater than zero"));
    }
    if config.fixture.vcs.trim().is_empty() {
        return Err(RunnerError::config("fixture.vcs must name a program"));
    }
    if config.fixture.baseline.trim().is_empty() {
        return Err(RunnerError::config("fixture.baseline must name a branch"));
    }
    if config
        .fixture
        .setup_command
        .first()
        .is_none_or(|program| program.trim().is_empty())
    {
        return Err(RunnerError::config("fixture.setup_command must name a program"));
    }
    if config.debug_shell.trim().is_empty() {
        return Err(RunnerError::config("debug_shell must name a program"));
    }

    let size = &config.terminal_size;
    for (name, value) in [("rows", size.rows), ("cols", size.cols)] {
        if !(MIN_TERMINAL_SIZE..=MAX_TERMINAL_SIZE).contains(&value) {
            return Err(RunnerError::config(format!(
                "terminal_size.{name} must be between {MIN_TERMINAL_SIZE} and {MAX_TERMINAL_SIZE}"
            ))
            .with_context(serde_json::json!({ "received": value })));
        }
    }

    if let Some(tool) = &config.tool {
        if tool.alias.trim().is_empty() {
            return Err(RunnerError::config("tool.alias must not be empty"));
        }
        if let ToolResolution::Interpreter { interpreter, .. } = &tool.resolution {
            if interpreter.trim().is_empty() {
                return Err(RunnerError::config(
                    "tool.resolution.interpreter must name a program",
                ));
            }
        }
    }
    Ok(())
}
