//! Script preparation: normalisation, pause markup and chunking.

mod chunker;
pub mod markup;

pub use chunker::split_into_chunks;
pub use markup::{DEFAULT_PAUSE_MS, PARAGRAPH_PAUSE_MS, break_durations, count_tags, count_words, to_ssml};

use crate::hashing::normalize_script;
use crate::settings::RenderSettings;

/// Nominal narration rate at speed 1.0.
pub const WORDS_PER_MINUTE: f64 = 155.0;

/// A prepared chunk before hashing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptChunk {
    /// Narration text with pause markers.
    pub text: String,
    /// Engine-facing form with break tags.
    pub ssml: String,
    pub estimated_duration_seconds: f64,
}

/// Normalise the script and turn paragraph breaks into pause markers.
#[must_use]
pub fn process_script(script: &str) -> String {
    let normalized = normalize_script(script);
    let marker = format!(" {} ", markup::pause_marker(PARAGRAPH_PAUSE_MS));
    normalized
        .split('\n')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(&marker)
}

/// Estimated spoken duration of marked-up text at the given speed.
#[must_use]
pub fn estimate_duration_seconds(text: &str, speed: f32) -> f64 {
    let speed = if speed > 0.0 { f64::from(speed) } else { 1.0 };
    let words = count_words(text) as f64;
    let pauses_ms: u32 = break_durations(text).iter().sum();
    words / (WORDS_PER_MINUTE * speed) * 60.0 + f64::from(pauses_ms) / 1000.0
}

/// Prepare a raw script into ordered chunks.
///
/// Returns an empty list for scripts with nothing to say; callers treat
/// that as malformed input.
#[must_use]
pub fn prepare(script: &str, settings: &RenderSettings) -> Vec<ScriptChunk> {
    let processed = process_script(script);
    split_into_chunks(&processed, settings.chunking.max_chunk_chars)
        .into_iter()
        .filter(|text| count_words(text) > 0 || count_tags(text) > 0)
        .map(|text| ScriptChunk {
            ssml: to_ssml(&text),
            estimated_duration_seconds: estimate_duration_seconds(&text, settings.voice.speed),
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_become_pauses() {
        let processed = process_script("First para.\r\n\r\n  Second   para.");
        assert_eq!(processed, "First para. [pause 700ms] Second para.");
    }

    #[test]
    fn test_prepare_single_chunk() {
        let chunks = prepare("Hello world.", &RenderSettings::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello world.");
        assert_eq!(chunks[0].ssml, "Hello world.");
        // 2 words at 155 wpm
        assert!((chunks[0].estimated_duration_seconds - 2.0 / 155.0 * 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_prepare_rejects_empty() {
        assert!(prepare("   \n\t ", &RenderSettings::default()).is_empty());
        assert!(prepare("[pause] [pause 1s]", &RenderSettings::default()).is_empty());
    }

    #[test]
    fn test_estimate_includes_pauses_and_speed() {
        let base = estimate_duration_seconds("one two three four five", 1.0);
        let fast = estimate_duration_seconds("one two three four five", 2.0);
        assert!((base - fast * 2.0).abs() < 1e-9);
        let paused = estimate_duration_seconds("one two three four five [pause 1.5s]", 1.0);
        assert!((paused - base - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_prepare_respects_chunk_size() {
        let mut settings = RenderSettings::default();
        settings.chunking.max_chunk_chars = 100;
        let script = "A sentence that has a handful of words in it. ".repeat(12);
        let chunks = prepare(&script, &settings);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.len() <= 100));
    }
}
