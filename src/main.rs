//! avrisp - AVR in-system programmer
//!
//! Programs AVR microcontrollers over their serial programming interface:
//! erases the chip, writes fuse and lock bytes, and streams an Intel HEX
//! image into flash page by page.
//!
//! # Architecture
//!
//! All protocol logic lives in `avrisp-core` and is driven through the
//! `IspProgrammer` trait. Each programmer backend (emulated target, Linux
//! GPIO bitbang) implements that trait, so every command works the same
//! regardless of the hardware behind it.

mod cli;
mod commands;
mod programmers;

use avrisp_core::programmer::Line;
use avrisp_core::session::SessionConfig;
use clap::Parser;
use cli::{Cli, Commands, TargetArgs};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Program {
            programmer,
            input,
            profile,
            total_lines,
            target,
        } => {
            let config = load_profile(profile.as_deref())?;
            let (reset, enable) = target_lines(&target);
            let mut master = programmers::open_programmer(&programmer)?;
            commands::program::run_program(
                master.as_mut(),
                &input,
                config,
                total_lines,
                reset,
                enable,
            )
        }
        Commands::Erase {
            programmer,
            profile,
            target,
        } => {
            let config = load_profile(profile.as_deref())?;
            let (reset, enable) = target_lines(&target);
            let mut master = programmers::open_programmer(&programmer)?;
            commands::erase::run_erase(master.as_mut(), &config.poll, reset, enable)
        }
        Commands::ReadFuses { programmer, target } => {
            let (reset, enable) = target_lines(&target);
            let mut master = programmers::open_programmer(&programmer)?;
            commands::fuses::run_read_fuses(master.as_mut(), reset, enable)
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Load a fuse profile, or the built-in defaults when none is given
fn load_profile(path: Option<&Path>) -> Result<SessionConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let config = SessionConfig::from_toml_file(path)
                .map_err(|e| format!("Failed to load profile {}: {}", path.display(), e))?;
            log::info!(
                "Loaded profile {} (low=0x{:02X}, high=0x{:02X}, extended=0x{:02X})",
                path.display(),
                config.fuses.low,
                config.fuses.high,
                config.fuses.extended
            );
            Ok(config)
        }
        None => Ok(SessionConfig::default()),
    }
}

fn target_lines(args: &TargetArgs) -> (Option<Line>, Option<Line>) {
    (args.reset_line.map(Line), args.enable_line.map(Line))
}
