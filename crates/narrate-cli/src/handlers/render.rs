//! Render command handler.

use std::path::Path;

use anyhow::Result;
use narrate_render::RunOutcome;

use super::{load_settings, read_script};
use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Create a job from a script file and, unless `no_wait`, render it in
/// this process.
pub async fn execute(ctx: &CliContext, file: &Path, settings: Option<&str>, no_wait: bool) -> Result<()> {
    let script = read_script(file).await?;
    let settings = load_settings(settings).await?;
    let render_id = ctx.service.create(&script, settings).await.map_err(CliError::from)?;

    if no_wait {
        println!("{render_id}");
        eprintln!("Queued. Render it with: narrate run {render_id}");
        return Ok(());
    }

    eprintln!("Rendering {render_id}...");
    match ctx.service.run(&render_id).await.map_err(CliError::from)? {
        RunOutcome::Rendered(report) => {
            println!("render_id   = {}", report.render_id);
            println!("final       = {}", report.final_audio.url);
            println!("format      = {}", report.format.extension());
            println!("chunks      = {}", report.chunk_count);
            println!("engine      = {} calls, {} cached", report.engine_calls, report.cache_hits);
            println!("stitch      = {:?}", report.stitch);
            println!("mastered    = {}", report.mastered);
            println!("duration    = {:.1}s", report.diagnostics.duration_seconds);
        }
        RunOutcome::AlreadyDone => println!("{render_id} already done"),
    }
    Ok(())
}
