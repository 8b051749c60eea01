//! Hash command handler.
//!
//! Shows the keys a render of the script would use, without touching
//! storage or the voice engine. Useful for checking why a re-render did
//! or did not hit the chunk cache.

use std::path::Path;

use anyhow::Result;
use narrate_core::{RenderSettings, chunk_hash, prepare, script_hash, settings_hash_of};

use super::{load_settings, read_script};
use crate::error::CliError;

/// One prepared chunk and its cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkKey {
    pub index: usize,
    pub content_hash: String,
    pub estimated_seconds: f64,
    pub chars: usize,
}

/// Hashes of a script under the given settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptKeys {
    pub script_hash: String,
    pub settings_hash: String,
    pub chunks: Vec<ChunkKey>,
}

pub async fn execute(file: &Path, settings: Option<&str>) -> Result<()> {
    let script = read_script(file).await?;
    let settings = load_settings(settings).await?;
    let keys = script_keys(&script, &settings)?;

    println!("script   = {}", keys.script_hash);
    println!("settings = {}", keys.settings_hash);
    for chunk in &keys.chunks {
        println!(
            "chunk {:04} {} ({} chars, ~{:.1}s)",
            chunk.index, chunk.content_hash, chunk.chars, chunk.estimated_seconds
        );
    }
    Ok(())
}

pub fn script_keys(script: &str, settings: &RenderSettings) -> Result<ScriptKeys, CliError> {
    let settings_hash = settings_hash_of(settings).map_err(|e| CliError::Input(e.to_string()))?;
    let chunks = prepare(script, settings)
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            Ok(ChunkKey {
                index,
                content_hash: chunk_hash(&chunk.ssml, &settings.voice, settings.output.sample_rate)
                    .map_err(|e| CliError::Input(e.to_string()))?,
                estimated_seconds: chunk.estimated_duration_seconds,
                chars: chunk.text.len(),
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;
    if chunks.is_empty() {
        return Err(CliError::Input("script produces no chunks".to_string()));
    }

    Ok(ScriptKeys {
        script_hash: script_hash(script),
        settings_hash,
        chunks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_variants_share_keys() {
        let settings = RenderSettings::default();
        let a = script_keys("Hello world.\r\nGoodbye.", &settings).unwrap();
        let b = script_keys("Hello   world.\nGoodbye.", &settings).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_voice_changes_chunk_keys_only_through_voice() {
        let mut settings = RenderSettings::default();
        let a = script_keys("Hello world.", &settings).unwrap();
        settings.voice.voice_id = "other".into();
        let b = script_keys("Hello world.", &settings).unwrap();
        assert_eq!(a.script_hash, b.script_hash);
        assert_ne!(a.settings_hash, b.settings_hash);
        assert_ne!(a.chunks[0].content_hash, b.chunks[0].content_hash);
    }

    #[test]
    fn test_empty_script_has_no_keys() {
        let err = script_keys("  \n ", &RenderSettings::default()).unwrap_err();
        assert_eq!(err.exit_code(), 65);
    }
}
