//! External processes: `uv run` for scripts and the user's editor.

use crate::error::ApiError;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::debug;

pub const UV_PROGRAM: &str = "uv";

/// Shell-style rendering of the `uv run` invocation, for dry runs.
pub fn uv_command_line(script: &Path, params: &[String]) -> String {
    let mut parts = vec![
        UV_PROGRAM.to_string(),
        "run".to_string(),
        script.display().to_string(),
    ];
    parts.extend(params.iter().cloned());
    parts
        .iter()
        .map(|p| {
            if p.is_empty() || p.contains(char::is_whitespace) {
                format!("'{}'", p.replace('\'', "'\\''"))
            } else {
                p.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run the script with `uv run`, inheriting stdio. Returns the child's exit code.
pub fn run_with_uv(script: &Path, params: &[String]) -> Result<i32, ApiError> {
    debug!("Executing: {}", uv_command_line(script, params));
    let status = Command::new(UV_PROGRAM)
        .arg("run")
        .arg(script)
        .args(params)
        .status()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ApiError::CommandFailed(
                    "The 'uv' package manager could not be found. Install it from https://astral.sh/uv"
                        .to_string(),
                )
            } else {
                ApiError::CommandFailed(format!("Failed to start uv: {}", e))
            }
        })?;
    // Killed by a signal: no code, report a generic failure.
    Ok(status.code().unwrap_or(1))
}

/// `--editor`, else `$VISUAL`, else `$EDITOR`.
pub fn resolve_editor(explicit: Option<&str>) -> Result<String, ApiError> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var("VISUAL").ok())
        .or_else(|| std::env::var("EDITOR").ok())
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            ApiError::ConfigError(
                "No editor specified and $EDITOR not set. Use --editor <editor>".to_string(),
            )
        })
}

/// Open `content` in `editor` through a temp file and return the edited text.
///
/// `editor` may carry arguments (`"code --wait"`).
pub fn edit_text(editor: &str, content: &str, suffix: &str) -> Result<String, ApiError> {
    let mut temp = tempfile::Builder::new()
        .prefix("sm-edit-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| ApiError::CommandFailed(format!("Failed to create temp file: {}", e)))?;
    temp.write_all(content.as_bytes())
        .and_then(|_| temp.flush())
        .map_err(|e| ApiError::CommandFailed(format!("Failed to write temp file: {}", e)))?;

    let mut words = editor.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| ApiError::ConfigError("Editor command is empty".to_string()))?;
    let status = Command::new(program)
        .args(words)
        .arg(temp.path())
        .status()
        .map_err(|e| ApiError::CommandFailed(format!("Failed to open editor: {}", e)))?;
    if !status.success() {
        return Err(ApiError::CommandFailed(
            "Editor exited with non-zero status".to_string(),
        ));
    }

    std::fs::read_to_string(temp.path())
        .map_err(|e| ApiError::CommandFailed(format!("Failed to read edited file: {}", e)))
}
