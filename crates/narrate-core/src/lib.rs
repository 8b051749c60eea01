//! Core domain types, hashing, script preparation and port definitions for
//! the narrate render pipeline.
//!
//! This crate performs no I/O. Storage, the voice engine and the media
//! engine are reached only through the traits in [`ports`].
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod hashing;
pub mod paths;
pub mod ports;
pub mod script;
pub mod settings;

pub use config::{ConfigError, ContinuityConfig, PacingConfig, RenderConfig, RetryPolicy};
pub use domain::{
    BreakHistogram, Chunk, Diagnostics, InvalidRenderId, JoinSpike, Manifest, Progress, RenderId,
    RenderRequest, RenderState, RenderStatus, StatusError, StepName, StepStatus,
};
pub use hashing::{chunk_hash, hash_bytes, normalize_script, script_hash, settings_hash_of};
pub use ports::{
    Access, EncodeSpec, Filter, MediaEngine, MediaError, ObjectStore, PutOptions, StitchSpec,
    StorageError, StoredObject, SynthesisEngine, SynthesisError, SynthesisRequest,
    SynthesisResponse, mastering_chain,
};
pub use script::{ScriptChunk, prepare};
pub use settings::{
    ChunkingSettings, CompressorSettings, CrossfadeSettings, FadeCurve, MasteringSettings,
    OutputFormat, OutputSettings, RenderSettings, SettingsError, VoiceSettings, validate_settings,
};
