//! Full render through the CLI composition root on a real directory.
//!
//! # What is tested
//!
//! - `bootstrap` with the engine bypassed and the native media engine
//! - Artifacts land under `renders/{id}/` in the data directory
//! - Status handler output for a finished job

use narrate_cli::handlers::status::format_status;
use narrate_cli::{CliConfig, MediaEngineChoice, bootstrap};
use narrate_core::{RenderSettings, RenderState};

#[tokio::test]
async fn test_bypass_render_writes_artifacts_to_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = bootstrap(CliConfig {
        data_dir: dir.path().to_path_buf(),
        bypass_engine: true,
        media_engine: MediaEngineChoice::Native,
    })
    .unwrap();

    let mut settings = RenderSettings::default();
    settings.output.sample_rate = 16_000;
    let id = ctx
        .service
        .create("A quiet test. [pause 300ms] Nothing is spoken.", settings)
        .await
        .unwrap();
    ctx.service.run(&id).await.unwrap();

    let render_dir = dir.path().join("renders").join(id.as_str());
    for name in ["request.json", "manifest.json", "status.json", "diagnostics.json", "final.wav"] {
        assert!(render_dir.join(name).is_file(), "missing {name}");
    }
    assert!(render_dir.join("chunks").join("0000.wav").is_file());

    let status = ctx.service.status(&id).await.unwrap();
    assert_eq!(status.state, RenderState::Done);
    let text = format_status(&status);
    assert!(text.contains("state    = done"));
    assert!(text.contains("[x] complete"));
}
