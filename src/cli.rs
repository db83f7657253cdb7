//! CLI argument definitions for the `wbs` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wbs - plan work as Markdown, review it as a table, gantt or board.
#[derive(Parser, Debug)]
#[command(name = "wbs")]
#[command(author, version, about = "Work breakdown structures over plain Markdown files", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to the current directory).
    /// Can also be set via the WBS_DIR environment variable.
    #[arg(short = 'C', long = "dir", global = true, env = "WBS_DIR")]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse the project and report warnings without touching anything
    Check,

    /// Export the project; the format follows the output extension
    /// (.json, .csv, .mmd, .md)
    Export {
        /// Output file path
        output: PathBuf,
    },

    /// Create a starter project file and default configuration
    Init {
        /// Project name recorded in the configuration
        #[arg(long)]
        name: Option<String>,
    },
}
