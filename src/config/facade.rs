//! ConfigLoader: composes the configuration sources and deserializes `SmConfig`.

use super::sources::{environment, file};
use super::{xdg, SmConfig};
use config::{Config, ConfigError};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the default config file (if present) and the environment.
    pub fn load() -> Result<SmConfig, ConfigError> {
        let builder = Config::builder();
        let builder = match xdg::config_file_path() {
            Some(path) => file::add_to_builder(builder, &path, false),
            None => builder,
        };
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// Load from an explicit config file, which must exist, plus the environment.
    pub fn load_from_file(path: &Path) -> Result<SmConfig, ConfigError> {
        let builder = file::add_to_builder(Config::builder(), path, true);
        let builder = environment::add_to_builder(builder);
        builder.build()?.try_deserialize()
    }

    /// `--config` when given, otherwise the default location.
    pub fn load_with(path: Option<&Path>) -> Result<SmConfig, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }
}
