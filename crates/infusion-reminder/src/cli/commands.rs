//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.listen_addr`)
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<String>,
}

/// Check command arguments.
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Send notifications and schedule the next run
    #[arg(short, long)]
    pub notify: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Configuration variable commands.
#[derive(Debug, Subcommand)]
pub enum VarCommand {
    /// List every stored variable
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print one variable
    Get {
        /// Variable name, e.g. `NIGHTSCOUT_LINK`
        name: String,
    },

    /// Validate and store a variable
    Set {
        /// Variable name, e.g. `TO_NUMBER_1`
        name: String,
        /// New value
        value: String,
    },

    /// Remove a variable
    Unset {
        /// Variable name
        name: String,
    },
}
