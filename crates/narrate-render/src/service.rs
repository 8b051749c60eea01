//! Job submission and the background render worker.
//!
//! Submission validates the input, writes `request.json` and a `queued`
//! status, and returns the new [`RenderId`] immediately. A single
//! long-lived runner task drains the queue and is the only writer of a
//! job's status after creation.
//!
//! # Design
//!
//! - Single long-lived runner (`runner_started` is never reset)
//! - `Notify` wakes the runner when work is enqueued
//! - Jobs run one at a time, in submission order

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use narrate_core::paths::{diagnostics_path, manifest_path, request_path, status_path};
use narrate_core::{
    Diagnostics, Manifest, MediaEngine, ObjectStore, PutOptions, RenderConfig, RenderId,
    RenderRequest, RenderSettings, RenderStatus, SynthesisEngine, hashing, validate_settings,
};
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::fetcher::RetryableFetcher;
use crate::pipeline::{RenderPipeline, RunOutcome, build_manifest};
use crate::status::write_status;

/// Front door of the render system.
pub struct RenderService {
    store: Arc<dyn ObjectStore>,
    fetcher: RetryableFetcher,
    pipeline: RenderPipeline,
    queue: Mutex<VecDeque<RenderId>>,
    queue_notify: Notify,
    runner_started: AtomicBool,
}

impl RenderService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        engine: Arc<dyn SynthesisEngine>,
        media: Arc<dyn MediaEngine>,
        config: RenderConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            fetcher: RetryableFetcher::new(Arc::clone(&store)),
            pipeline: RenderPipeline::new(Arc::clone(&store), engine, media, config),
            store,
            queue: Mutex::new(VecDeque::new()),
            queue_notify: Notify::new(),
            runner_started: AtomicBool::new(false),
        })
    }

    pub const fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Validate and persist a new job without queueing it.
    ///
    /// Malformed input is rejected before anything is written. The job can
    /// later be driven with [`run`](Self::run), possibly by another process.
    pub async fn create(&self, script: &str, settings: RenderSettings) -> Result<RenderId, RenderError> {
        validate_settings(&settings)?;
        if script.trim().is_empty() {
            return Err(RenderError::EmptyScript);
        }

        let render_id = RenderId::generate();
        let request = RenderRequest {
            render_id: render_id.clone(),
            script: script.to_string(),
            script_hash: hashing::script_hash(script),
            settings_hash: hashing::settings_hash_of(&settings)
                .map_err(|e| RenderError::serialize("settings", e))?,
            settings,
            submitted_at: Utc::now(),
        };
        // Fails with NoChunks before any write.
        let chunks = build_manifest(&request)?.chunks.len();

        let bytes = serde_json::to_vec_pretty(&request).map_err(|e| RenderError::serialize("request", e))?;
        self.store
            .put(&request_path(&render_id), bytes, PutOptions::json())
            .await?;
        write_status(self.store.as_ref(), &render_id, &RenderStatus::queued(request.submitted_at)).await?;

        info!(
            target: "narrate.render",
            render_id = %render_id,
            chunks,
            script_hash = %request.script_hash,
            settings_hash = %request.settings_hash,
            "Render created"
        );
        Ok(render_id)
    }

    /// Create a job, queue it and make sure the runner is going.
    pub async fn submit(self: &Arc<Self>, script: &str, settings: RenderSettings) -> Result<RenderId, RenderError> {
        let render_id = self.create(script, settings).await?;
        self.enqueue(render_id.clone()).await;
        self.ensure_runner();
        Ok(render_id)
    }

    /// Queue an existing job for the runner.
    pub async fn enqueue(&self, render_id: RenderId) {
        let position = {
            let mut queue = self.queue.lock().await;
            queue.push_back(render_id.clone());
            queue.len()
        };
        info!(target: "narrate.render", render_id = %render_id, position, "Render queued");
        self.queue_notify.notify_one();
    }

    /// Number of jobs waiting for the runner.
    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Run a job in the calling task. See [`RenderPipeline::run`].
    pub async fn run(&self, render_id: &RenderId) -> Result<RunOutcome, RenderError> {
        self.pipeline.run(render_id).await
    }

    /// Ensure the runner is started.
    ///
    /// Idempotent: the runner is spawned once and lives as long as the
    /// service.
    pub fn ensure_runner(self: &Arc<Self>) {
        if self
            .runner_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let service = Arc::clone(self);
            tokio::spawn(async move {
                service.run_loop().await;
            });
        }
    }

    /// Drain the queue, then wait for more work.
    async fn run_loop(&self) {
        loop {
            let next = self.queue.lock().await.pop_front();
            if let Some(render_id) = next {
                match self.pipeline.run(&render_id).await {
                    Ok(_) => {}
                    Err(e) => warn!(
                        target: "narrate.render",
                        render_id = %render_id,
                        error = %e.report(),
                        "Queued render did not complete"
                    ),
                }
            } else {
                self.queue_notify.notified().await;
            }
        }
    }

    /// Current status of a job.
    pub async fn status(&self, render_id: &RenderId) -> Result<RenderStatus, RenderError> {
        self.read(render_id, &status_path(render_id)).await
    }

    /// The stored submission.
    pub async fn request(&self, render_id: &RenderId) -> Result<RenderRequest, RenderError> {
        self.read(render_id, &request_path(render_id)).await
    }

    /// The job's manifest, once chunking has run.
    pub async fn manifest(&self, render_id: &RenderId) -> Result<Manifest, RenderError> {
        self.read(render_id, &manifest_path(render_id)).await
    }

    /// The job's diagnostics, once analysis has run.
    pub async fn diagnostics(&self, render_id: &RenderId) -> Result<Diagnostics, RenderError> {
        self.read(render_id, &diagnostics_path(render_id)).await
    }

    /// Poll until the job is `done` or `failed`.
    pub async fn wait_for_terminal(
        &self,
        render_id: &RenderId,
        poll: Duration,
        timeout: Duration,
    ) -> Result<RenderStatus, RenderError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.status(render_id).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RenderError::Timeout(timeout));
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn read<T: DeserializeOwned>(&self, render_id: &RenderId, path: &str) -> Result<T, RenderError> {
        match self
            .fetcher
            .fetch_json(path, &self.pipeline.config().critical_retry)
            .await
        {
            Ok(value) => Ok(value),
            Err(e) if e.is_not_found() => Err(RenderError::NotFound(render_id.clone())),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use narrate_audio::NativeMediaEngine;
    use narrate_core::{RenderState, SynthesisError, SynthesisRequest, SynthesisResponse};
    use narrate_storage::MemoryObjectStore;

    use super::*;

    struct NeverCalled;

    #[async_trait]
    impl SynthesisEngine for NeverCalled {
        async fn synthesize(&self, _: &SynthesisRequest) -> Result<SynthesisResponse, SynthesisError> {
            Err(SynthesisError::Transport("unexpected call".into()))
        }

        fn name(&self) -> &str {
            "never"
        }
    }

    fn service(store: Arc<MemoryObjectStore>, config: RenderConfig) -> Arc<RenderService> {
        RenderService::new(store, Arc::new(NeverCalled), Arc::new(NativeMediaEngine::new()), config)
    }

    #[tokio::test]
    async fn test_create_writes_request_and_queued_status() {
        let store = Arc::new(MemoryObjectStore::new());
        let svc = service(store.clone(), RenderConfig::for_tests());
        let id = svc.create("Hello there.", RenderSettings::default()).await.unwrap();

        let status = svc.status(&id).await.unwrap();
        assert_eq!(status.state, RenderState::Queued);
        let request = svc.request(&id).await.unwrap();
        assert_eq!(request.script, "Hello there.");
        assert_eq!(request.script_hash, hashing::script_hash("Hello  there."));
        assert_eq!(store.keys().await.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_input_writes_nothing() {
        let store = Arc::new(MemoryObjectStore::new());
        let svc = service(store.clone(), RenderConfig::for_tests());

        let err = svc.create("   ", RenderSettings::default()).await.unwrap_err();
        assert!(matches!(err, RenderError::EmptyScript));

        let mut settings = RenderSettings::default();
        settings.voice.voice_id = String::new();
        let err = svc.create("Hello.", settings).await.unwrap_err();
        assert!(matches!(err, RenderError::InvalidSettings(_)));

        let err = svc.create("[pause 300ms]", RenderSettings::default()).await.unwrap_err();
        assert!(matches!(err, RenderError::NoChunks));

        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_render_is_not_found() {
        let store = Arc::new(MemoryObjectStore::new());
        let svc = service(store, RenderConfig::for_tests());
        let err = svc.status(&RenderId::generate()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_bypass_submit_runs_in_background() {
        let store = Arc::new(MemoryObjectStore::new());
        let config = RenderConfig {
            bypass_engine: true,
            ..RenderConfig::for_tests()
        };
        let svc = service(store, config);
        let id = svc.submit("Quiet render.", RenderSettings::default()).await.unwrap();
        let status = svc
            .wait_for_terminal(&id, Duration::from_millis(10), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(status.state, RenderState::Done);
        assert_eq!(svc.queue_len().await, 0);
    }

    #[tokio::test]
    async fn test_runner_drains_every_queued_job() {
        let store = Arc::new(MemoryObjectStore::new());
        let config = RenderConfig {
            bypass_engine: true,
            ..RenderConfig::for_tests()
        };
        let svc = service(store, config);
        let mut ids = Vec::new();
        for script in ["First job.", "Second job.", "Third job."] {
            ids.push(svc.create(script, RenderSettings::default()).await.unwrap());
        }
        for id in &ids {
            svc.enqueue(id.clone()).await;
        }
        svc.ensure_runner();

        for id in &ids {
            let status = svc
                .wait_for_terminal(id, Duration::from_millis(10), Duration::from_secs(30))
                .await
                .unwrap();
            assert_eq!(status.state, RenderState::Done);
        }
        assert_eq!(svc.queue_len().await, 0);
    }
}
