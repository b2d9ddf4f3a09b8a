//! Logging System
//!
//! Structured logging on top of `tracing`. Settings are resolved with the
//! precedence CLI flags, then `SM_LOG*` environment variables, then the
//! `[logging]` config section, then defaults.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

pub const ENV_LOG: &str = "SM_LOG";
pub const ENV_LOG_FORMAT: &str = "SM_LOG_FORMAT";
pub const ENV_LOG_OUTPUT: &str = "SM_LOG_OUTPUT";
pub const ENV_LOG_FILE: &str = "SM_LOG_FILE";
pub const ENV_LOG_MODULES: &str = "SM_LOG_MODULES";

const LOG_FILE_NAME: &str = "script-magic.log";

/// `[logging]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// None means the platform state directory.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Text format on a terminal only.
    #[serde(default = "default_true")]
    pub color: bool,

    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "file".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: BTreeMap::new(),
        }
    }
}

/// Logging flags given on the command line.
#[derive(Debug, Clone, Default)]
pub struct LoggingOverrides {
    pub verbose: bool,
    pub level: Option<String>,
    pub format: Option<String>,
    pub output: Option<String>,
    pub file: Option<PathBuf>,
}

/// Fully resolved settings handed to the subscriber.
#[derive(Debug, Clone, PartialEq)]
struct LogSettings {
    enabled: bool,
    filter: String,
    format: LogFormat,
    output: OutputDestinations,
    file: Option<PathBuf>,
    color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

fn resolve_settings(
    config: &LoggingConfig,
    cli: &LoggingOverrides,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<LogSettings, ApiError> {
    let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    let level = if let Some(level) = &cli.level {
        level.clone()
    } else if cli.verbose {
        "debug".to_string()
    } else if let Some(level) = env(ENV_LOG) {
        level
    } else {
        config.level.clone()
    };

    let mut directives = vec![level.clone()];
    if level != "off" {
        directives.extend(
            config
                .modules
                .iter()
                .map(|(module, module_level)| format!("{}={}", module, module_level)),
        );
        if let Some(modules) = env(ENV_LOG_MODULES) {
            for spec in modules.split(',') {
                if let Some((module, module_level)) = spec.split_once('=') {
                    directives.push(format!("{}={}", module.trim(), module_level.trim()));
                }
            }
        }
    }

    let format = cli
        .format
        .clone()
        .or_else(|| env(ENV_LOG_FORMAT))
        .unwrap_or_else(|| config.format.clone());
    let output = cli
        .output
        .clone()
        .or_else(|| env(ENV_LOG_OUTPUT))
        .unwrap_or_else(|| config.output.clone());
    let file = cli
        .file
        .clone()
        .or_else(|| env(ENV_LOG_FILE).map(PathBuf::from))
        .or_else(|| config.file.clone());

    Ok(LogSettings {
        enabled: config.enabled,
        filter: directives.join(","),
        format: parse_format(&format)?,
        output: parse_output_destinations(&output)?,
        file,
        color: config.color,
    })
}

fn parse_format(format: &str) -> Result<LogFormat, ApiError> {
    match format {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ApiError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, ApiError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}

/// Default log file under the platform state directory.
pub fn default_log_file_path() -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "script-magic", "script-magic")
        .ok_or_else(|| {
            ApiError::ConfigError("Could not determine platform directories for log file".to_string())
        })?;
    // state_dir is Linux-only; fall back to the local data directory elsewhere.
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join(LOG_FILE_NAME))
}

fn open_log_file(path: &PathBuf) -> Result<std::fs::File, ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::ConfigError(format!("Failed to create log directory: {}", e)))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ApiError::ConfigError(format!("Failed to open log file {:?}: {}", path, e)))
}

fn build_writer(settings: &LogSettings) -> Result<BoxMakeWriter, ApiError> {
    let output = settings.output;
    if output.file {
        let path = match &settings.file {
            Some(path) => path.clone(),
            None => default_log_file_path()?,
        };
        let file = open_log_file(&path)?;
        return Ok(if output.stderr {
            BoxMakeWriter::new(file.and(std::io::stderr))
        } else {
            BoxMakeWriter::new(file)
        });
    }
    Ok(match (output.stdout, output.stderr) {
        (true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (false, true) => BoxMakeWriter::new(std::io::stderr),
        _ => BoxMakeWriter::new(std::io::stdout),
    })
}

/// Install the global subscriber. Call once, from the binary.
pub fn init_logging(config: &LoggingConfig, cli: &LoggingOverrides) -> Result<(), ApiError> {
    let settings = resolve_settings(config, cli, &|key| std::env::var(key).ok())?;

    if !settings.enabled {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = EnvFilter::try_new(&settings.filter)
        .map_err(|e| ApiError::ConfigError(format!("Invalid log directive: {}", e)))?;
    let writer = build_writer(&settings)?;
    let ansi = settings.color && !settings.output.file;
    let subscriber = Registry::default().with(filter);

    match settings.format {
        LogFormat::Json => subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init(),
        LogFormat::Text => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .init(),
    }

    Ok(())
}
