//! Command-line interface for infusion-reminder.
//!
//! This module provides the CLI structure for the `reminder` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{CheckCommand, ConfigCommand, ServeCommand, StatusCommand, VarCommand};

/// reminder - Infusion set and CGM sensor change reminders
///
/// Reads the last site and sensor changes from Nightscout, works out how long
/// until the next change and sends SMS / IFTTT reminders. `serve` runs the
/// web panel used to edit the reminder settings.
#[derive(Debug, Parser)]
#[command(name = "reminder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the web panel
    Serve(ServeCommand),

    /// Run one checkup from the command line
    Check(CheckCommand),

    /// Show store status
    Status(StatusCommand),

    /// View or validate bootstrap configuration
    #[command(subcommand)]
    Config(ConfigCommand),

    /// View or modify reminder variables
    #[command(subcommand)]
    Var(VarCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.verbose, self.quiet)
    }
}
