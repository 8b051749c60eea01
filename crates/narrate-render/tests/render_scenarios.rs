//! End-to-end render scenarios against in-memory storage.
//!
//! # What is tested
//!
//! - A short script renders to `done` with a manifest, final audio and
//!   diagnostics
//! - Rendering identical text a second time makes no engine calls
//! - Changing the voice or the output sample rate misses the chunk cache
//! - A failing chunk fails the job with the cause persisted and no final
//!   artifact written
//! - Lagging reads are absorbed by the critical retry policy
//! - Step flags and progress in the final status
//! - Re-running finished and failed jobs
//! - A job left `running` by a dead worker resumes from the cache
//! - A job over its time limit fails with the cause persisted

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use narrate_audio::NativeMediaEngine;
use narrate_core::paths::{final_path, status_path};
use narrate_core::{
    ObjectStore, OutputFormat, PutOptions, RenderSettings, RenderState, RetryPolicy, StepName,
    SynthesisEngine, SynthesisError, SynthesisRequest, SynthesisResponse,
};
use narrate_render::{RenderError, RenderService, RunOutcome};
use narrate_storage::MemoryObjectStore;

use common::{ScriptedEngine, THREE_CHUNK_SCRIPT, fast_settings, test_config, tone_wav};

fn service(store: Arc<MemoryObjectStore>, engine: Arc<ScriptedEngine>) -> Arc<RenderService> {
    RenderService::new(store, engine, Arc::new(NativeMediaEngine::new()), test_config())
}

async fn final_keys(store: &MemoryObjectStore) -> Vec<String> {
    store
        .keys()
        .await
        .into_iter()
        .filter(|k| k.contains("/final."))
        .collect()
}

// ── Happy path ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_short_script_renders_to_done() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let id = svc.submit("Hello world.", RenderSettings::default()).await.unwrap();
    let status = svc
        .wait_for_terminal(&id, Duration::from_millis(10), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(status.state, RenderState::Done, "error: {:?}", status.error);
    assert!(status.error.is_none());
    for step in StepName::ALL {
        assert!(status.step_ok(step), "step {step:?} not ok");
    }

    let manifest = svc.manifest(&id).await.unwrap();
    assert!(!manifest.chunks.is_empty());
    assert_eq!(status.progress.total, manifest.chunks.len() as u32);
    assert_eq!(status.progress.done, status.progress.total);

    assert!(store.contains(&final_path(&id, OutputFormat::Wav)).await);

    let diagnostics = svc.diagnostics(&id).await.unwrap();
    assert!(diagnostics.words_per_minute > 0.0);
    assert_eq!(diagnostics.word_count, 2);
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_run_report_counts_chunks_and_calls() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let id = svc.create(THREE_CHUNK_SCRIPT, fast_settings()).await.unwrap();
    let RunOutcome::Rendered(report) = svc.run(&id).await.unwrap() else {
        panic!("expected a render");
    };

    assert_eq!(report.chunk_count, 3);
    assert_eq!(report.engine_calls, 3);
    assert_eq!(report.cache_hits, 0);
    assert_eq!(report.format, OutputFormat::Wav);
    assert_eq!(report.diagnostics.chunk_count, 3);
    assert!(report.final_audio.path.ends_with("/final.wav"));

    // Continuity: later calls carry the ids of earlier ones.
    let requests = engine.requests.lock().unwrap().clone();
    assert!(requests[0].previous_request_ids.is_empty());
    assert_eq!(requests[2].previous_request_ids, vec!["req-1", "req-2"]);
    assert!(requests[0].previous_text.is_none());
    assert!(requests[1].previous_text.is_some());
    assert!(requests[2].next_text.is_none());
}

// ── Cache reuse ────────────────────────────────────────────────────

#[tokio::test]
async fn test_identical_text_reuses_cached_chunks() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let first = svc.create(THREE_CHUNK_SCRIPT, fast_settings()).await.unwrap();
    svc.run(&first).await.unwrap();
    let calls_after_first = engine.calls();
    assert_eq!(calls_after_first, 3);

    let second = svc.create(THREE_CHUNK_SCRIPT, fast_settings()).await.unwrap();
    let RunOutcome::Rendered(report) = svc.run(&second).await.unwrap() else {
        panic!("expected a render");
    };

    assert_eq!(engine.calls(), calls_after_first);
    assert_eq!(report.cache_hits, 3);
    assert_eq!(report.engine_calls, 0);
    assert_eq!(svc.status(&second).await.unwrap().state, RenderState::Done);
}

#[tokio::test]
async fn test_voice_change_misses_cache() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let first = svc.create("Hello world.", fast_settings()).await.unwrap();
    svc.run(&first).await.unwrap();

    let mut settings = fast_settings();
    settings.voice.voice_id = "second-narrator".into();
    let second = svc.create("Hello world.", settings).await.unwrap();
    svc.run(&second).await.unwrap();

    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_sample_rate_change_misses_cache() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let first = svc.create("Hello world.", fast_settings()).await.unwrap();
    svc.run(&first).await.unwrap();

    let mut settings = fast_settings();
    settings.output.sample_rate = 44_100;
    let second = svc.create("Hello world.", settings).await.unwrap();
    let RunOutcome::Rendered(report) = svc.run(&second).await.unwrap() else {
        panic!("expected a render");
    };

    assert_eq!(engine.calls(), 2);
    assert_eq!(report.engine_calls, 1);
    assert_eq!(report.cache_hits, 0);
    let requests = engine.requests.lock().unwrap().clone();
    assert_eq!(requests[0].sample_rate, 16_000);
    assert_eq!(requests[1].sample_rate, 44_100);
}

// ── Failure ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failing_chunk_fails_job_without_final() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::failing_on(2));
    let svc = service(store.clone(), engine.clone());

    let id = svc.create(THREE_CHUNK_SCRIPT, fast_settings()).await.unwrap();
    let err = svc.run(&id).await.unwrap_err();
    assert!(matches!(err, RenderError::Synthesis { index: 1, .. }));

    let status = svc.status(&id).await.unwrap();
    assert_eq!(status.state, RenderState::Failed);
    let message = status.error.clone().unwrap();
    assert!(message.contains("voice model temporarily overloaded"), "{message}");
    assert!(message.contains("chunk 1"), "{message}");

    assert!(status.step_ok(StepName::Ssml));
    assert!(!status.step_ok(StepName::Synthesize));
    assert_eq!(status.progress.done, 1);
    assert!(final_keys(&store).await.is_empty());
    // The third chunk is never attempted.
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_failed_job_is_not_rerun() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::failing_on(1));
    let svc = service(store.clone(), engine.clone());

    let id = svc.create("Hello world.", fast_settings()).await.unwrap();
    svc.run(&id).await.unwrap_err();

    let err = svc.run(&id).await.unwrap_err();
    assert!(matches!(
        err,
        RenderError::Terminal {
            state: RenderState::Failed,
            ..
        }
    ));
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_done_job_is_not_rerun() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let id = svc.create("Hello world.", fast_settings()).await.unwrap();
    svc.run(&id).await.unwrap();
    assert!(matches!(svc.run(&id).await.unwrap(), RunOutcome::AlreadyDone));
    assert_eq!(engine.calls(), 1);
}

// ── Recovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_running_job_resumes_from_cache() {
    let store = Arc::new(MemoryObjectStore::new());
    let engine = Arc::new(ScriptedEngine::new());
    let svc = service(store.clone(), engine.clone());

    let warm = svc.create(THREE_CHUNK_SCRIPT, fast_settings()).await.unwrap();
    svc.run(&warm).await.unwrap();
    assert_eq!(engine.calls(), 3);

    // A worker that died after the first chunk leaves this behind.
    let id = svc.create(THREE_CHUNK_SCRIPT, fast_settings()).await.unwrap();
    let mut status = svc.status(&id).await.unwrap();
    status.transition(RenderState::Running).unwrap();
    status.complete_step(StepName::Ssml);
    status.set_progress(1, 3).unwrap();
    store
        .put(&status_path(&id), serde_json::to_vec(&status).unwrap(), PutOptions::json())
        .await
        .unwrap();

    let RunOutcome::Rendered(report) = svc.run(&id).await.unwrap() else {
        panic!("expected a render");
    };
    assert_eq!(report.engine_calls, 0);
    assert_eq!(report.cache_hits, 3);
    assert_eq!(engine.calls(), 3);

    let status = svc.status(&id).await.unwrap();
    assert_eq!(status.state, RenderState::Done);
    assert_eq!(status.progress.done, 3);
    assert!(status.error.is_none());
    assert!(store.contains(&final_path(&id, OutputFormat::Wav)).await);
}

/// Engine that takes far longer than the job is allowed.
struct SlowEngine;

#[async_trait]
impl SynthesisEngine for SlowEngine {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, SynthesisError> {
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(SynthesisResponse {
            audio: tone_wav(0.4, request.sample_rate),
            request_id: None,
        })
    }

    fn name(&self) -> &str {
        "slow"
    }
}

#[tokio::test]
async fn test_job_over_time_limit_fails() {
    let store = Arc::new(MemoryObjectStore::new());
    let mut config = test_config();
    config.job_timeout = Some(Duration::from_millis(50));
    let svc = RenderService::new(
        store.clone(),
        Arc::new(SlowEngine),
        Arc::new(NativeMediaEngine::new()),
        config,
    );

    let id = svc.create("Hello world.", fast_settings()).await.unwrap();
    let err = svc.run(&id).await.unwrap_err();
    assert!(matches!(err, RenderError::Timeout(limit) if limit == Duration::from_millis(50)));

    let status = svc.status(&id).await.unwrap();
    assert_eq!(status.state, RenderState::Failed);
    let message = status.error.clone().unwrap();
    assert!(message.contains("time limit"), "{message}");
    assert!(!status.step_ok(StepName::Synthesize));
    assert!(final_keys(&store).await.is_empty());
}

// ── Eventual consistency ───────────────────────────────────────────

#[tokio::test]
async fn test_lagging_reads_are_retried() {
    let store = Arc::new(MemoryObjectStore::new().with_read_lag(2));
    let engine = Arc::new(ScriptedEngine::new());
    let mut config = test_config();
    config.critical_retry = RetryPolicy::critical()
        .with_delays(Duration::from_millis(1), Duration::from_millis(5));
    let svc = RenderService::new(
        store.clone(),
        engine.clone(),
        Arc::new(NativeMediaEngine::new()),
        config,
    );

    let id = svc.create("Hello world.", fast_settings()).await.unwrap();
    svc.run(&id).await.unwrap();

    let status = svc.status(&id).await.unwrap();
    assert_eq!(status.state, RenderState::Done);
    assert_eq!(final_keys(&store).await.len(), 1);
}

#[tokio::test]
async fn test_unknown_job_cannot_run() {
    let store = Arc::new(MemoryObjectStore::new());
    let svc = service(store, Arc::new(ScriptedEngine::new()));
    let err = svc.run(&narrate_core::RenderId::generate()).await.unwrap_err();
    assert!(err.is_not_found());
}
