//! Run command handler.

use anyhow::Result;
use narrate_render::RunOutcome;

use super::parse_id;
use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Drive an existing job, e.g. one created with `render --no-wait` or left
/// `running` by an interrupted process.
pub async fn execute(ctx: &CliContext, id: &str) -> Result<()> {
    let render_id = parse_id(id)?;
    match ctx.service.run(&render_id).await.map_err(CliError::from)? {
        RunOutcome::Rendered(report) => {
            println!("{} done: {}", report.render_id, report.final_audio.url);
        }
        RunOutcome::AlreadyDone => println!("{render_id} already done"),
    }
    Ok(())
}
