//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Help text for the programmer argument
const PROGRAMMER_HELP: &str =
    "Programmer to use, as name[:key=value,...] (see 'avrisp list-programmers')";

#[derive(Parser)]
#[command(name = "avrisp")]
#[command(author, version, about = "AVR in-system programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target wiring shared across commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Reset line (defaults to the programmer's reset line)
    #[arg(long)]
    pub reset_line: Option<u32>,

    /// Power-enable line, pulsed low after programming to restart the target
    #[arg(long)]
    pub enable_line: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Erase the target and write an Intel HEX image, fuses and lock bits
    Program {
        /// Programmer to use
        #[arg(short, long, help = PROGRAMMER_HELP)]
        programmer: String,

        /// Intel HEX image (.hex)
        input: PathBuf,

        /// Fuse profile (TOML format)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Number of image lines used for progress (counted from the file if not specified)
        #[arg(long)]
        total_lines: Option<u32>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Erase flash and lock bits
    Erase {
        /// Programmer to use
        #[arg(short, long, help = PROGRAMMER_HELP)]
        programmer: String,

        /// Fuse profile (TOML format, only the poll settings are used)
        #[arg(long)]
        profile: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Read and decode the fuse and lock bytes
    ReadFuses {
        /// Programmer to use
        #[arg(short, long, help = PROGRAMMER_HELP)]
        programmer: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// List supported programmers
    ListProgrammers,
}
