//! # nativize CLI Entry Point
//!
//! Parses the command line, loads `nativize.toml` from the current
//! directory, then translates every source pattern and, with `-b`/`-i`,
//! builds the results into native extension modules.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;

use nativize::cli::Cli;
use nativize::config;
use nativize::orchestrate;
use nativize::toolchain::{CcToolchain, NativeToolchain};
use nativize::translate::ExternalTranslator;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir()?;
    let project = config::load_project_config(&cwd)?;
    let config = cli.into_configuration(project)?;

    let translator = ExternalTranslator::from_config(&config.project);
    let toolchain = if config.build {
        let cc: Arc<dyn NativeToolchain> = Arc::new(CcToolchain::from_config(&config)?);
        Some(cc)
    } else {
        None
    };

    let summary = orchestrate::run(&config, &translator, toolchain)?;

    if !config.quiet {
        if config.build {
            println!(
                "{} {} module(s) translated, {} sent to the native build in {:.2?}",
                "✓".green(),
                summary.translated,
                summary.dispatched,
                summary.elapsed
            );
        } else {
            println!(
                "{} {} module(s) translated in {:.2?}",
                "✓".green(),
                summary.translated,
                summary.elapsed
            );
        }
    }
    Ok(())
}
