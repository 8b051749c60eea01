//! Shared fakes for render integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use narrate_audio::PcmBuffer;
use narrate_core::{
    ObjectStore, PutOptions, RenderConfig, RenderSettings, RenderState, RenderStatus,
    StorageError, StoredObject, SynthesisEngine, SynthesisError, SynthesisRequest,
    SynthesisResponse,
};
use narrate_storage::MemoryObjectStore;

/// Three sentences that chunk into three chunks at the minimum chunk size.
pub const THREE_CHUNK_SCRIPT: &str =
    "The opening line sets the scene. A second line carries it along. The third line brings it home.";

/// A 220 Hz tone as 16-bit mono WAV.
pub fn tone_wav(seconds: f64, rate: u32) -> Vec<u8> {
    let frames = (seconds * f64::from(rate)) as usize;
    let samples = (0..frames)
        .map(|i| (i as f32 * 220.0 * std::f32::consts::TAU / rate as f32).sin() * 0.25)
        .collect();
    PcmBuffer::new(samples, rate, 1).unwrap().to_wav().unwrap()
}

/// Settings that keep the native DSP fast.
pub fn fast_settings() -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.output.sample_rate = 16_000;
    settings.chunking.max_chunk_chars = 50;
    settings
}

pub fn test_config() -> RenderConfig {
    RenderConfig::for_tests()
}

// ── Scripted voice engine ──────────────────────────────────────────

/// Returns a short tone per call, optionally failing on one call.
pub struct ScriptedEngine {
    calls: AtomicU32,
    fail_on_call: Option<u32>,
    pub requests: Mutex<Vec<SynthesisRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_on_call: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail the `call`-th request (1-based) with an upstream error.
    pub fn failing_on(call: u32) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisEngine for ScriptedEngine {
    async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesisResponse, SynthesisError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_on_call == Some(call) {
            return Err(SynthesisError::upstream(
                Some(503),
                "voice model temporarily overloaded",
            ));
        }
        Ok(SynthesisResponse {
            audio: tone_wav(0.4, request.sample_rate),
            request_id: Some(format!("req-{call}")),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ── Recording store ────────────────────────────────────────────────

/// Memory store that records every status snapshot written.
pub struct RecordingStore {
    pub inner: MemoryObjectStore,
    pub states: Mutex<Vec<RenderState>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryObjectStore::new(),
            states: Mutex::new(Vec::new()),
        }
    }

    pub fn states(&self) -> Vec<RenderState> {
        self.states.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<StoredObject, StorageError> {
        if path.ends_with("/status.json") {
            let status: RenderStatus = serde_json::from_slice(&bytes).unwrap();
            self.states.lock().unwrap().push(status.state);
        }
        self.inner.put(path, bytes, options).await
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(path).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<StoredObject>, StorageError> {
        self.inner.list(prefix).await
    }
}
