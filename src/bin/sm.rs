//! Script Magic CLI Binary

use clap::Parser;
use script_magic::config::ConfigLoader;
use script_magic::logging::init_logging;
use script_magic::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    let cli = Cli::parse();

    let config = match ConfigLoader::load_with(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging, &cli.logging_overrides()) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let mut context = match CliContext::new(config, cli.data_dir.clone()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error initializing script inventory: {}", e);
            process::exit(e.exit_code());
        }
    };

    match context.execute(&cli.command) {
        Ok(output) => {
            if !output.text.is_empty() {
                println!("{}", output.text);
            }
            process::exit(output.exit_code);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
