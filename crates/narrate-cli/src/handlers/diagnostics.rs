//! Diagnostics command handler.

use anyhow::Result;

use super::parse_id;
use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Print `diagnostics.json` of a finished job as pretty JSON.
pub async fn execute(ctx: &CliContext, id: &str) -> Result<()> {
    let render_id = parse_id(id)?;
    let diagnostics = ctx.service.diagnostics(&render_id).await.map_err(CliError::from)?;
    println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    Ok(())
}
