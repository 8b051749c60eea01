//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::commands::Commands;

/// Environment variable naming the storage root.
pub const ENV_DATA_DIR: &str = "NARRATE_DATA_DIR";

/// Which media engine assembles audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MediaEngineChoice {
    /// In-process DSP, WAV output only
    Native,
    /// The `ffmpeg` binary
    Ffmpeg,
    /// `ffmpeg` when found on PATH, otherwise native
    #[default]
    Auto,
}

/// Command-line interface for the narration renderer.
///
/// This is the top-level parser that handles global options and dispatches
/// to subcommands.
#[derive(Parser)]
#[command(name = "narrate")]
#[command(about = "Render narration scripts into mastered audio")]
#[command(version)]
pub struct Cli {
    /// Storage root for renders and the chunk cache
    #[arg(long = "data-dir", env = ENV_DATA_DIR, default_value = "narrate-data", global = true)]
    pub data_dir: PathBuf,

    /// Replace voice engine calls with silence of the estimated duration
    #[arg(long = "bypass-engine", global = true)]
    pub bypass_engine: bool,

    /// Media engine used for stitching, mastering and encoding
    #[arg(long = "media-engine", value_enum, default_value_t = MediaEngineChoice::Auto, global = true)]
    pub media_engine: MediaEngineChoice,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
