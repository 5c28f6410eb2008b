use clap::Parser;

use tributary_core::config::{self, Config};
use tributary_core::display::{self, LogLevel};

use crate::actions;
use crate::cli::args::{Cli, Commands};

pub(crate) fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.global.quiet {
        LogLevel::Error
    } else {
        match cli.global.verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    };
    display::set_level(level);
    if cli.global.no_ansi {
        display::set_ansi(false);
    }
    config::set_config(Config {
        assume_yes: cli.global.yes,
    });

    match cli.command {
        Commands::Ingest { workflow, force } => actions::ingest::run(&workflow, force),
        Commands::Contribute { dry_run } => actions::contribute::run(dry_run),
        Commands::ChooseWorkflow { workflow } => actions::choose::run(&workflow),
    }
}
