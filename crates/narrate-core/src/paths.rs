//! Object-store key layout.
//!
//! All keys are relative, `/`-separated, and never contain `..`. The render
//! id character set is validated by [`RenderId`], so joining it is safe.
//!
//! ```text
//! renders/{id}/request.json
//! renders/{id}/manifest.json
//! renders/{id}/status.json
//! renders/{id}/diagnostics.json
//! renders/{id}/final.{ext}
//! renders/{id}/chunks/{index:04}.{ext}
//! cache/chunks/{hash}.{ext}
//! ```

use crate::domain::RenderId;
use crate::settings::OutputFormat;

/// Prefix for all per-job artifacts.
pub const RENDERS_PREFIX: &str = "renders";

/// Prefix for the content-addressed chunk cache.
pub const CHUNK_CACHE_PREFIX: &str = "cache/chunks";

/// Extension of intermediate chunk audio (always uncompressed PCM WAV).
pub const CHUNK_AUDIO_EXT: &str = "wav";

/// Directory holding everything for one job.
#[must_use]
pub fn render_dir(id: &RenderId) -> String {
    format!("{RENDERS_PREFIX}/{id}")
}

#[must_use]
pub fn request_path(id: &RenderId) -> String {
    format!("{}/request.json", render_dir(id))
}

#[must_use]
pub fn manifest_path(id: &RenderId) -> String {
    format!("{}/manifest.json", render_dir(id))
}

#[must_use]
pub fn status_path(id: &RenderId) -> String {
    format!("{}/status.json", render_dir(id))
}

#[must_use]
pub fn diagnostics_path(id: &RenderId) -> String {
    format!("{}/diagnostics.json", render_dir(id))
}

/// Location of the finished render.
#[must_use]
pub fn final_path(id: &RenderId, format: OutputFormat) -> String {
    format!("{}/final.{}", render_dir(id), format.extension())
}

/// Per-job copy of a synthesized chunk, zero-padded so listings sort.
#[must_use]
pub fn chunk_path(id: &RenderId, index: u32) -> String {
    format!("{}/chunks/{index:04}.{CHUNK_AUDIO_EXT}", render_dir(id))
}

/// Shared cache entry for a chunk content hash.
#[must_use]
pub fn chunk_cache_path(content_hash: &str) -> String {
    format!("{CHUNK_CACHE_PREFIX}/{content_hash}.{CHUNK_AUDIO_EXT}")
}

/// Reject keys that are absolute, empty, or escape their prefix.
#[must_use]
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}
