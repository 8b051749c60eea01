//! CLI bootstrap - the composition root.
//!
//! The only place where adapters are wired together:
//! - Filesystem object store (via narrate-storage)
//! - HTTP voice engine (via narrate-synth), unless bypassed
//! - Native or ffmpeg media engine (via narrate-audio)
//! - Render service (via narrate-render)

use std::path::PathBuf;
use std::sync::Arc;

use narrate_audio::{FfmpegEngine, NativeMediaEngine};
use narrate_core::{MediaEngine, ObjectStore, RenderConfig, SynthesisEngine};
use narrate_render::RenderService;
use narrate_storage::FsObjectStore;
use narrate_synth::{HttpSynthesisEngine, SynthConfig};
use tracing::{debug, info, warn};

use crate::error::CliError;
use crate::parser::{Cli, MediaEngineChoice};

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    pub bypass_engine: bool,
    pub media_engine: MediaEngineChoice,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            data_dir: cli.data_dir.clone(),
            bypass_engine: cli.bypass_engine,
            media_engine: cli.media_engine,
        }
    }
}

/// Fully composed context for command handlers.
pub struct CliContext {
    pub service: Arc<RenderService>,
    pub data_dir: PathBuf,
}

/// Wire the adapters into a [`RenderService`].
///
/// Process configuration comes from `NARRATE_*` variables, with the
/// `--bypass-engine` flag taking precedence.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let mut render_config = RenderConfig::from_env()?;
    render_config.bypass_engine |= config.bypass_engine;

    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(config.data_dir.clone()));
    let engine = synthesis_engine(render_config.bypass_engine)?;
    let media = media_engine(config.media_engine)?;

    info!(
        data_dir = %config.data_dir.display(),
        bypass_engine = render_config.bypass_engine,
        media_engine = media.name(),
        "narrate ready"
    );

    Ok(CliContext {
        service: RenderService::new(store, engine, media, render_config),
        data_dir: config.data_dir,
    })
}

fn synthesis_engine(bypass: bool) -> Result<Arc<dyn SynthesisEngine>, CliError> {
    let config = SynthConfig::from_env();
    if !bypass && !config.has_api_key() {
        warn!("No voice engine API key set; requests will likely be rejected");
    }
    debug!(base_url = config.base_url(), "Voice engine configured");
    let engine = HttpSynthesisEngine::new(config).map_err(|e| CliError::Config(e.to_string()))?;
    Ok(Arc::new(engine))
}

fn media_engine(choice: MediaEngineChoice) -> Result<Arc<dyn MediaEngine>, CliError> {
    match choice {
        MediaEngineChoice::Native => Ok(Arc::new(NativeMediaEngine::new())),
        MediaEngineChoice::Ffmpeg => {
            let ffmpeg = FfmpegEngine::discover();
            if ffmpeg.binary().is_none() {
                return Err(CliError::Unavailable("ffmpeg not found on PATH".to_string()));
            }
            Ok(Arc::new(ffmpeg))
        }
        MediaEngineChoice::Auto => {
            let ffmpeg = FfmpegEngine::discover();
            if ffmpeg.binary().is_some() {
                Ok(Arc::new(ffmpeg))
            } else {
                debug!("ffmpeg not found, using native media engine");
                Ok(Arc::new(NativeMediaEngine::new()))
            }
        }
    }
}
