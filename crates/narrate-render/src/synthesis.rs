//! Sequential chunk synthesis with continuity context.
//!
//! Chunks are rendered strictly in order. Each chunk is looked up in the
//! [`ChunkCache`] first; on a miss the voice engine is called with the
//! neighbouring chunk text and the request ids of the last few engine
//! calls, and the result is cached before the next chunk starts.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use narrate_audio::PcmBuffer;
use narrate_core::{
    Chunk, ContinuityConfig, PacingConfig, RenderConfig, SynthesisEngine, SynthesisError,
    SynthesisRequest, VoiceSettings,
};
use tracing::{debug, info};

use crate::cache::ChunkCache;
use crate::error::RenderError;

/// Where a chunk's audio came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSource {
    Cache,
    Engine,
    /// Synthetic silence; the engine was bypassed.
    Bypass,
}

/// Audio for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkAudio {
    pub index: u32,
    /// WAV bytes.
    pub audio: Vec<u8>,
    pub source: AudioSource,
}

/// Per-job continuity state carried from one chunk to the next.
#[derive(Debug, Default)]
pub struct SynthesisSession {
    request_ids: VecDeque<String>,
    engine_calls: u32,
    cache_hits: u32,
}

impl SynthesisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn engine_calls(&self) -> u32 {
        self.engine_calls
    }

    pub const fn cache_hits(&self) -> u32 {
        self.cache_hits
    }

    /// Request ids that will accompany the next engine call, oldest first.
    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids.iter().cloned().collect()
    }

    fn remember(&mut self, request_id: Option<String>, window: usize) {
        if window == 0 {
            return;
        }
        if let Some(id) = request_id {
            self.request_ids.push_back(id);
            while self.request_ids.len() > window {
                self.request_ids.pop_front();
            }
        }
    }
}

/// Drives the voice engine for a job's chunks.
#[derive(Clone)]
pub struct SynthesisClient {
    engine: Arc<dyn SynthesisEngine>,
    cache: ChunkCache,
    bypass: bool,
    pacing: PacingConfig,
    continuity: ContinuityConfig,
}

impl SynthesisClient {
    pub fn new(engine: Arc<dyn SynthesisEngine>, cache: ChunkCache, config: &RenderConfig) -> Self {
        Self {
            engine,
            cache,
            bypass: config.bypass_engine,
            pacing: config.pacing.clone(),
            continuity: config.continuity.clone(),
        }
    }

    /// Produce audio for `chunks[position]`.
    ///
    /// Must be called for positions in increasing order with the same
    /// `session` so that continuity context and pacing line up.
    pub async fn render_chunk(
        &self,
        session: &mut SynthesisSession,
        chunks: &[Chunk],
        position: usize,
        voice: &VoiceSettings,
        sample_rate: u32,
    ) -> Result<ChunkAudio, RenderError> {
        let chunk = &chunks[position];

        if self.bypass {
            let audio = bypass_audio(chunk, sample_rate).map_err(|source| RenderError::Synthesis {
                index: chunk.index,
                source,
            })?;
            debug!(target: "narrate.synth", chunk = chunk.index, "Engine bypassed, using silence");
            return Ok(ChunkAudio {
                index: chunk.index,
                audio,
                source: AudioSource::Bypass,
            });
        }

        if let Some(audio) = self.cache.lookup(&chunk.content_hash).await {
            session.cache_hits += 1;
            return Ok(ChunkAudio {
                index: chunk.index,
                audio,
                source: AudioSource::Cache,
            });
        }

        if session.engine_calls > 0 {
            let delay = self.pacing.delay_after(session.engine_calls);
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
        }

        let request = self.build_request(session, chunks, position, voice, sample_rate);
        session.engine_calls += 1;
        info!(
            target: "narrate.synth",
            chunk = chunk.index,
            hash = %chunk.content_hash,
            call = session.engine_calls,
            "Synthesizing chunk"
        );

        let synth_err = |source| RenderError::Synthesis {
            index: chunk.index,
            source,
        };
        let response = self.engine.synthesize(&request).await.map_err(synth_err)?;

        // Reject undecodable audio before it can poison the cache.
        PcmBuffer::from_wav(&response.audio)
            .map_err(|e| synth_err(SynthesisError::InvalidResponse(e.to_string())))?;

        session.remember(response.request_id, self.continuity.request_id_window);
        self.cache.store(&chunk.content_hash, response.audio.clone()).await?;

        Ok(ChunkAudio {
            index: chunk.index,
            audio: response.audio,
            source: AudioSource::Engine,
        })
    }

    fn build_request(
        &self,
        session: &SynthesisSession,
        chunks: &[Chunk],
        position: usize,
        voice: &VoiceSettings,
        sample_rate: u32,
    ) -> SynthesisRequest {
        let chars = self.continuity.context_chars;
        let previous_text = position
            .checked_sub(1)
            .and_then(|p| chunks.get(p))
            .and_then(|c| tail_chars(&c.text, chars));
        let next_text = chunks
            .get(position + 1)
            .and_then(|c| head_chars(&c.text, chars));

        SynthesisRequest {
            text: chunks[position].ssml.clone(),
            voice: voice.clone(),
            sample_rate,
            previous_text,
            next_text,
            previous_request_ids: session.request_ids(),
        }
    }
}

/// Silence standing in for engine output, sized to the chunk's estimate.
fn bypass_audio(chunk: &Chunk, sample_rate: u32) -> Result<Vec<u8>, SynthesisError> {
    let seconds = chunk.estimated_duration_seconds.clamp(0.1, 600.0);
    PcmBuffer::silence(Duration::from_secs_f64(seconds), sample_rate, 1)
        .and_then(|buf| buf.to_wav())
        .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))
}

/// Last `n` characters of `text`, or `None` if there is nothing to send.
fn tail_chars(text: &str, n: usize) -> Option<String> {
    let count = text.chars().count();
    let tail: String = text.chars().skip(count.saturating_sub(n)).collect();
    let tail = tail.trim();
    (!tail.is_empty()).then(|| tail.to_string())
}

/// First `n` characters of `text`, or `None` if there is nothing to send.
fn head_chars(text: &str, n: usize) -> Option<String> {
    let head: String = text.chars().take(n).collect();
    let head = head.trim();
    (!head.is_empty()).then(|| head.to_string())
}
