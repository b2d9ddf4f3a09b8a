//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, then the TOML config
//! file, then `SM__SECTION__KEY` environment variables.

pub mod facade;
pub mod sources;
pub mod xdg;

pub use facade::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::remote::gist::DEFAULT_API_URL;
use crate::sync::ConflictPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variables consulted for the gist token when `token_env` is unset.
pub const DEFAULT_TOKEN_ENVS: [&str; 2] = ["MY_GITHUB_PAT", "GITHUB_TOKEN"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmConfig {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    pub generator: GeneratorConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// None means `$XDG_DATA_HOME/script-magic`.
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ApiError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => xdg::default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub api_url: String,
    pub token: Option<String>,
    /// Name of the environment variable holding the token.
    pub token_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            token_env: None,
            timeout_secs: 20,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Token from config, else from `token_env`, else from the default variables.
    pub fn resolve_token(&self) -> Option<String> {
        self.resolve_token_with(&|key| std::env::var(key).ok())
    }

    fn resolve_token_with(&self, env: &dyn Fn(&str) -> Option<String>) -> Option<String> {
        let non_empty = |v: String| {
            let v = v.trim().to_string();
            (!v.is_empty()).then_some(v)
        };
        if let Some(token) = self.token.clone().and_then(non_empty) {
            return Some(token);
        }
        match &self.token_env {
            Some(var) => env(var).and_then(non_empty),
            None => DEFAULT_TOKEN_ENVS
                .iter()
                .find_map(|var| env(var).and_then(non_empty)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Push after every add/remove.
    pub auto_sync: bool,
    pub conflict_policy: ConflictPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            conflict_policy: ConflictPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::provider::openai::DEFAULT_ENDPOINT.to_string(),
            model: crate::provider::openai::DEFAULT_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

impl GeneratorConfig {
    pub fn api_key(&self) -> Result<String, ApiError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ApiError::ConfigError(format!(
                    "Environment variable {} is not set; it must hold the generator API key",
                    self.api_key_env
                ))
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
