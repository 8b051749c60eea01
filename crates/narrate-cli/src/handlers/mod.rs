//! Command handlers.
//!
//! Handlers follow one pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Parse CLI-specific input, call the render service, print the result.

pub mod diagnostics;
pub mod hash;
pub mod render;
pub mod run;
pub mod status;

use std::path::Path;

use narrate_core::{RenderId, RenderSettings, validate_settings};

use crate::error::CliError;

/// Parse a render id argument.
pub(crate) fn parse_id(raw: &str) -> Result<RenderId, CliError> {
    raw.trim()
        .parse()
        .map_err(|_| CliError::Input(format!("'{raw}' is not a valid render id")))
}

/// Read a script file.
pub(crate) async fn read_script(path: &Path) -> Result<String, CliError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Io(format!("{}: {e}", path.display())))
}

/// Resolve `--settings`: inline JSON, a path to a JSON file, or defaults.
pub(crate) async fn load_settings(arg: Option<&str>) -> Result<RenderSettings, CliError> {
    let Some(arg) = arg else {
        return Ok(RenderSettings::default());
    };
    let json = if arg.trim_start().starts_with('{') {
        arg.to_string()
    } else {
        tokio::fs::read_to_string(arg)
            .await
            .map_err(|e| CliError::Io(format!("{arg}: {e}")))?
    };
    let settings: RenderSettings =
        serde_json::from_str(&json).map_err(|e| CliError::Input(format!("settings: {e}")))?;
    validate_settings(&settings)?;
    Ok(settings)
}
