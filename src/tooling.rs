//! Tooling & Integration Layer
//!
//! The `sm` command surface and the terminal, editor and process glue it needs.

pub mod cli;
pub mod format;
pub mod launcher;
pub mod prompt;

pub use cli::{Cli, CliContext, CommandOutput, Commands, OutputFormat};
