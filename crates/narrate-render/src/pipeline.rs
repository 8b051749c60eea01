//! Render job orchestration.
//!
//! [`RenderPipeline::run`] drives one job from `queued`/`running` to a
//! terminal state:
//!
//! 1. `ssml`/`chunk`: prepare the script and write `manifest.json`
//! 2. `synthesize`: render chunks in order, writing each to `chunks/`
//! 3. `stitch`, `master`: assemble the final track and write `final.{ext}`
//! 4. `analyze`: write `diagnostics.json`
//! 5. `complete`
//!
//! Status is persisted after every step. Any error is recorded as a
//! `failed` status before it is returned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use narrate_audio::PcmBuffer;
use narrate_core::paths::{chunk_path, diagnostics_path, final_path, manifest_path, request_path};
use narrate_core::{
    Chunk, Diagnostics, Manifest, MediaEngine, ObjectStore, OutputFormat, PutOptions,
    RenderConfig, RenderId, RenderRequest, RenderState, RenderStatus, StepName, StitchSpec, StoredObject,
    SynthesisEngine, chunk_hash, prepare,
};
use tracing::{error, info, warn};

use crate::assembler::{AudioAssembler, StitchMode};
use crate::cache::ChunkCache;
use crate::diagnostics::DiagnosticsCollector;
use crate::error::RenderError;
use crate::fetcher::RetryableFetcher;
use crate::status::StatusTracker;
use crate::synthesis::{SynthesisClient, SynthesisSession};

/// Summary of a completed render.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub render_id: RenderId,
    pub final_audio: StoredObject,
    pub format: OutputFormat,
    pub chunk_count: u32,
    pub engine_calls: u32,
    pub cache_hits: u32,
    pub stitch: StitchMode,
    pub mastered: bool,
    pub diagnostics: Diagnostics,
}

/// Result of [`RenderPipeline::run`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The job had already finished; nothing was done.
    AlreadyDone,
    Rendered(Box<RenderReport>),
}

/// Build the manifest for a request. Pure; no storage access.
pub fn build_manifest(request: &RenderRequest) -> Result<Manifest, RenderError> {
    let prepared = prepare(&request.script, &request.settings);
    if prepared.is_empty() {
        return Err(RenderError::NoChunks);
    }
    let chunks = prepared
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let content_hash = chunk_hash(
                &c.ssml,
                &request.settings.voice,
                request.settings.output.sample_rate,
            )
            .map_err(|e| RenderError::serialize("voice settings", e))?;
            Ok(Chunk {
                index: i as u32,
                text: c.text,
                ssml: c.ssml,
                content_hash,
                estimated_duration_seconds: c.estimated_duration_seconds,
            })
        })
        .collect::<Result<Vec<_>, RenderError>>()?;

    Ok(Manifest {
        render_id: request.render_id.clone(),
        script_hash: request.script_hash.clone(),
        settings_hash: request.settings_hash.clone(),
        chunks,
        created_at: Utc::now(),
    })
}

/// Runs render jobs against a store, a voice engine and a media engine.
pub struct RenderPipeline {
    store: Arc<dyn ObjectStore>,
    fetcher: RetryableFetcher,
    synthesis: SynthesisClient,
    assembler: AudioAssembler,
    config: RenderConfig,
}

impl RenderPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn SynthesisEngine>,
        media: Arc<dyn MediaEngine>,
        config: RenderConfig,
    ) -> Self {
        let cache = ChunkCache::new(Arc::clone(&store), config.opportunistic_retry.clone());
        Self {
            fetcher: RetryableFetcher::new(Arc::clone(&store)),
            synthesis: SynthesisClient::new(engine, cache, &config),
            assembler: AudioAssembler::new(media),
            store,
            config,
        }
    }

    pub const fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Drive `id` to a terminal state.
    ///
    /// Re-invocable: a `done` job returns [`RunOutcome::AlreadyDone`], a
    /// `failed` job is rejected, and a job left `running` by a crashed
    /// worker is rendered again from the first chunk, with already cached
    /// chunks served from the cache.
    pub async fn run(&self, id: &RenderId) -> Result<RunOutcome, RenderError> {
        let mut tracker = StatusTracker::load(
            Arc::clone(&self.store),
            id.clone(),
            &self.config.critical_retry,
            self.config.opportunistic_retry.clone(),
        )
        .await?;

        match tracker.current().state {
            RenderState::Done => {
                info!(target: "narrate.render", render_id = %id, "Render already done");
                return Ok(RunOutcome::AlreadyDone);
            }
            RenderState::Failed => {
                return Err(RenderError::Terminal {
                    render_id: id.clone(),
                    state: RenderState::Failed,
                });
            }
            RenderState::Running => {
                warn!(target: "narrate.render", render_id = %id, "Resuming render left running");
            }
            RenderState::Queued => {}
        }

        info!(target: "narrate.render", render_id = %id, "Render started");
        let started = tracker.update(|s| s.transition(RenderState::Running)).await;
        let result = match started {
            Ok(()) => self.execute_with_timeout(&mut tracker).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(report) => {
                info!(
                    target: "narrate.render",
                    render_id = %id,
                    chunks = report.chunk_count,
                    engine_calls = report.engine_calls,
                    cache_hits = report.cache_hits,
                    format = report.format.extension(),
                    "Render done"
                );
                Ok(RunOutcome::Rendered(Box::new(report)))
            }
            Err(e) => {
                let message = e.report();
                error!(target: "narrate.render", render_id = %id, error = %message, "Render failed");
                if let Err(persist) = tracker.update(|s| s.fail(message)).await {
                    error!(
                        target: "narrate.render",
                        render_id = %id,
                        error = %persist.report(),
                        "Could not persist failed status"
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute_with_timeout(&self, tracker: &mut StatusTracker) -> Result<RenderReport, RenderError> {
        match self.config.job_timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(tracker))
                .await
                .unwrap_or(Err(RenderError::Timeout(limit))),
            None => self.execute(tracker).await,
        }
    }

    async fn execute(&self, tracker: &mut StatusTracker) -> Result<RenderReport, RenderError> {
        let id = tracker.render_id().clone();
        let request: RenderRequest = self
            .fetcher
            .fetch_json(&request_path(&id), &self.config.critical_retry)
            .await?;
        let settings = &request.settings;

        // ssml + chunk
        let manifest = build_manifest(&request)?;
        tracker.update(|s| {
            s.complete_step(StepName::Ssml);
            Ok(())
        })
        .await?;
        self.put_json(&manifest_path(&id), &manifest, "manifest").await?;
        let total = manifest.chunks.len() as u32;
        tracker
            .update(|s| {
                s.complete_step(StepName::Chunk);
                s.set_progress(0, total)?;
                s.step_progress(StepName::Synthesize, 0, total)
            })
            .await?;

        // synthesize
        let chunks = manifest.ordered().into_iter().cloned().collect::<Vec<_>>();
        let mut session = SynthesisSession::new();
        let mut audio = Vec::with_capacity(chunks.len());
        for position in 0..chunks.len() {
            let chunk = self
                .synthesis
                .render_chunk(&mut session, &chunks, position, &settings.voice, settings.output.sample_rate)
                .await?;
            self.store
                .put(&chunk_path(&id, chunk.index), chunk.audio.clone(), PutOptions::private("audio/wav"))
                .await?;
            audio.push(chunk.audio);

            let done = position as u32 + 1;
            tracker
                .update(|s| {
                    s.set_progress(done, total)?;
                    s.step_progress(StepName::Synthesize, done, total)
                })
                .await?;
        }
        tracker.update(|s| {
            s.complete_step(StepName::Synthesize);
            Ok(())
        })
        .await?;

        // stitch
        let crossfade = Duration::from_millis(u64::from(settings.crossfade.duration_ms));
        let spec = StitchSpec {
            crossfade,
            curve: settings.crossfade.curve,
            sample_rate: settings.output.sample_rate,
            channels: settings.output.channels,
        };
        let stitched = self.assembler.stitch(&audio, &spec).await?;
        let applied_crossfade = stitched.effective_crossfade(crossfade);
        let stitch_mode = stitched.mode;
        tracker.update(|s| {
            s.complete_step(StepName::Stitch);
            Ok(())
        })
        .await?;

        // master + encode
        let mastered = self.assembler.master(stitched.audio, &settings.mastering).await?;
        let encoded = self.assembler.encode(&mastered.audio, &settings.output).await?;
        let final_audio = self
            .store
            .put(
                &final_path(&id, encoded.format),
                encoded.bytes,
                PutOptions::public(encoded.format.content_type()),
            )
            .await?;
        tracker.update(|s| {
            s.complete_step(StepName::Master);
            Ok(())
        })
        .await?;

        // analyze
        let diagnostics = analyze(&manifest, &mastered.audio, &audio, settings.output.sample_rate, applied_crossfade);
        if let Err(e) = self.put_json(&diagnostics_path(&id), &diagnostics, "diagnostics").await {
            warn!(target: "narrate.render", render_id = %id, error = %e.report(), "Could not write diagnostics");
        }
        tracker.update(|s| {
            s.complete_step(StepName::Analyze);
            Ok(())
        })
        .await?;

        tracker.update(RenderStatus::finish).await?;

        Ok(RenderReport {
            render_id: id,
            final_audio,
            format: encoded.format,
            chunk_count: total,
            engine_calls: session.engine_calls(),
            cache_hits: session.cache_hits(),
            stitch: stitch_mode,
            mastered: mastered.applied,
            diagnostics,
        })
    }

    async fn put_json<T: serde::Serialize>(
        &self,
        path: &str,
        value: &T,
        what: &'static str,
    ) -> Result<StoredObject, RenderError> {
        let bytes = serde_json::to_vec_pretty(value).map_err(|e| RenderError::serialize(what, e))?;
        Ok(self.store.put(path, bytes, PutOptions::json()).await?)
    }
}

/// Measure the mastered track. Decode failures only cost the audio metrics.
fn analyze(
    manifest: &Manifest,
    mastered: &[u8],
    chunk_audio: &[Vec<u8>],
    sample_rate: u32,
    crossfade: Duration,
) -> Diagnostics {
    let pcm = match PcmBuffer::from_wav(mastered) {
        Ok(pcm) => Some(pcm),
        Err(e) => {
            warn!(target: "narrate.render", error = %e, "Mastered audio unreadable, skipping audio metrics");
            None
        }
    };
    let rate = pcm.as_ref().map_or(sample_rate, PcmBuffer::sample_rate);
    let chunk_frames: Vec<usize> = chunk_audio
        .iter()
        .filter_map(|wav| PcmBuffer::from_wav(wav).ok())
        .map(|c| {
            (c.frames() as u64 * u64::from(rate) / u64::from(c.sample_rate().max(1))) as usize
        })
        .collect();
    let chunk_frames = if chunk_frames.len() == chunk_audio.len() {
        chunk_frames
    } else {
        Vec::new()
    };
    DiagnosticsCollector::collect(manifest, pcm.as_ref(), &chunk_frames, crossfade)
}
