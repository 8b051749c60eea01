//! Status command handler.

use anyhow::Result;
use narrate_core::RenderStatus;

use super::parse_id;
use crate::bootstrap::CliContext;
use crate::error::CliError;

pub async fn execute(ctx: &CliContext, id: &str) -> Result<()> {
    let render_id = parse_id(id)?;
    let status = ctx.service.status(&render_id).await.map_err(CliError::from)?;
    print!("{}", format_status(&status));
    Ok(())
}

/// Human-readable status, one `key = value` line per field and one line
/// per step.
pub fn format_status(status: &RenderStatus) -> String {
    let mut out = format!(
        "state    = {}\nprogress = {}/{}\nupdated  = {}\n",
        status.state,
        status.progress.done,
        status.progress.total,
        status.updated_at.to_rfc3339()
    );
    if let Some(error) = &status.error {
        out.push_str(&format!("error    = {error}\n"));
    }
    for step in &status.steps {
        let mark = if step.ok { "x" } else { " " };
        let name = format!("{:?}", step.name).to_lowercase();
        match (step.done, step.total) {
            (Some(done), Some(total)) => out.push_str(&format!("  [{mark}] {name} ({done}/{total})\n")),
            _ => out.push_str(&format!("  [{mark}] {name}\n")),
        }
    }
    out
}
