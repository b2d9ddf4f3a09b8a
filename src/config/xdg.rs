//! XDG Base Directory paths.

use crate::error::ApiError;
use std::path::PathBuf;

pub const APP_DIR: &str = "script-magic";
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// `$XDG_DATA_HOME`, else `$HOME/.local/share`.
pub fn data_home() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// `$XDG_CONFIG_HOME`, else `$HOME/.config`.
pub fn config_home() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

pub fn default_data_dir() -> Result<PathBuf, ApiError> {
    data_home().map(|dir| dir.join(APP_DIR)).ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })
}

pub fn config_file_path() -> Option<PathBuf> {
    config_home().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}
