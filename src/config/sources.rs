//! Configuration sources.

pub mod file {
    use config::builder::DefaultState;
    use config::{ConfigBuilder, File, FileFormat};
    use std::path::Path;

    /// TOML file overlay; `required = false` skips a missing file.
    pub fn add_to_builder(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
        required: bool,
    ) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(required),
        )
    }
}

pub mod environment {
    use config::builder::DefaultState;
    use config::{ConfigBuilder, Environment};

    pub const PREFIX: &str = "SM";

    /// `SM__SECTION__KEY` overlay.
    pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
        builder.add_source(
            Environment::with_prefix(PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
    }
}
