//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

/// Operations on render jobs.
#[derive(Subcommand)]
pub enum Commands {
    /// Submit a script and render it
    Render {
        /// Path to the script text file
        file: PathBuf,
        /// Render settings as inline JSON or a path to a JSON file
        #[arg(short, long)]
        settings: Option<String>,
        /// Only create the job; render later with `narrate run`
        #[arg(long)]
        no_wait: bool,
    },

    /// Drive an existing job to completion
    Run {
        /// Render id
        id: String,
    },

    /// Show the status of a job
    Status {
        /// Render id
        id: String,
    },

    /// Show the diagnostics of a finished job
    Diagnostics {
        /// Render id
        id: String,
    },

    /// Print the script hash and per-chunk cache keys without rendering
    Hash {
        /// Path to the script text file
        file: PathBuf,
        /// Render settings as inline JSON or a path to a JSON file
        #[arg(short, long)]
        settings: Option<String>,
    },
}
