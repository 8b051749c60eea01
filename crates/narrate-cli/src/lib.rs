//! `narrate` command-line interface.
//!
//! Renders narration scripts into mastered audio against a local
//! filesystem store. [`bootstrap`] is the composition root; handlers in
//! [`handlers`] are thin wrappers over the render service.
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::{Cli, MediaEngineChoice};
