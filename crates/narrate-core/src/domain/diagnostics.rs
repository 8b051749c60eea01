//! Post-render quality report (`diagnostics.json`).

use serde::{Deserialize, Serialize};

/// Counts of inline breaks bucketed by duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakHistogram {
    #[serde(rename = "le200ms")]
    pub le_200ms: u32,
    #[serde(rename = "le300ms")]
    pub le_300ms: u32,
    #[serde(rename = "le500ms")]
    pub le_500ms: u32,
    #[serde(rename = "gt500ms")]
    pub gt_500ms: u32,
}

impl BreakHistogram {
    /// Build a histogram from break durations in milliseconds.
    #[must_use]
    pub fn from_durations(durations_ms: &[u32]) -> Self {
        let mut hist = Self::default();
        for &ms in durations_ms {
            match ms {
                0..=200 => hist.le_200ms += 1,
                201..=300 => hist.le_300ms += 1,
                301..=500 => hist.le_500ms += 1,
                _ => hist.gt_500ms += 1,
            }
        }
        hist
    }

    /// Total number of breaks.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.le_200ms + self.le_300ms + self.le_500ms + self.gt_500ms
    }
}

/// A chunk join whose short-term energy jumps relative to its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpike {
    /// Index of the chunk that starts at this join.
    pub index: u32,
    pub at_seconds: f64,
    /// Short-window RMS divided by surrounding RMS.
    pub ratio: f64,
}

/// Quality report for a completed render.
///
/// Loudness fields are `None` when the audio could not be measured (e.g.
/// silence or a lossy output the analyser cannot decode).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub words_per_minute: f64,
    /// Audio tags per 10 words.
    pub tag_density: f64,
    pub break_histogram: BreakHistogram,
    pub loudness_lufs: Option<f64>,
    pub true_peak_dbtp: Option<f64>,
    pub duration_seconds: f64,
    pub word_count: u32,
    pub tag_count: u32,
    pub chunk_count: u32,
    #[serde(default)]
    pub join_spikes: Vec<JoinSpike>,
}
