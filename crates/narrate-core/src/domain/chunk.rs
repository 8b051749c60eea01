//! Chunks and the per-job manifest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::render::RenderId;

/// One unit of synthesis and caching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// 0-based position; defines stitch order.
    pub index: u32,
    /// Processed narration text (pause markers included).
    pub text: String,
    /// Form sent to the voice engine (inline break tags).
    pub ssml: String,
    /// Hash of `ssml` + voice settings; the chunk cache key.
    pub content_hash: String,
    pub estimated_duration_seconds: f64,
}

/// Ordered chunk list plus the hashes it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub render_id: RenderId,
    pub script_hash: String,
    pub settings_hash: String,
    pub chunks: Vec<Chunk>,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the manifest has no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Sum of the per-chunk duration estimates.
    #[must_use]
    pub fn estimated_duration_seconds(&self) -> f64 {
        self.chunks
            .iter()
            .map(|c| c.estimated_duration_seconds)
            .sum()
    }

    /// Chunks sorted by their explicit index.
    ///
    /// Callers must never rely on the stored order (e.g. after a listing).
    pub fn ordered(&self) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self.chunks.iter().collect();
        chunks.sort_by_key(|c| c.index);
        chunks
    }

    /// Check that indices are exactly `0..len` with no gaps or duplicates.
    #[must_use]
    pub fn has_contiguous_indices(&self) -> bool {
        self.ordered()
            .iter()
            .enumerate()
            .all(|(i, c)| c.index as usize == i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32) -> Chunk {
        Chunk {
            index,
            text: format!("Chunk {index}."),
            ssml: format!("Chunk {index}."),
            content_hash: format!("{index:064}"),
            estimated_duration_seconds: 1.5,
        }
    }

    fn manifest(indices: &[u32]) -> Manifest {
        Manifest {
            render_id: RenderId::generate(),
            script_hash: String::new(),
            settings_hash: String::new(),
            chunks: indices.iter().copied().map(chunk).collect(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_ordered_uses_explicit_index() {
        let m = manifest(&[2, 0, 1]);
        let order: Vec<u32> = m.ordered().iter().map(|c| c.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert!(m.has_contiguous_indices());
    }

    #[test]
    fn test_detects_gaps() {
        assert!(!manifest(&[0, 2]).has_contiguous_indices());
        assert!(!manifest(&[0, 0]).has_contiguous_indices());
    }

    #[test]
    fn test_estimated_duration_sums_chunks() {
        let m = manifest(&[0, 1, 2]);
        assert!((m.estimated_duration_seconds() - 4.5).abs() < 1e-9);
        assert_eq!(m.len(), 3);
    }
}
