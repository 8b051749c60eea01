//! Render job identity and the immutable submission record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::RenderSettings;

/// Opaque identifier of a render job.
///
/// Assigned at submission and never reused. The character set is restricted
/// to `[A-Za-z0-9_-]` because the id is embedded in storage paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RenderId(String);

impl RenderId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("r_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejected render id string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid render id {0:?}: expected 1-128 characters of [A-Za-z0-9_-]")]
pub struct InvalidRenderId(pub String);

impl FromStr for RenderId {
    type Err = InvalidRenderId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && s.len() <= 128
            && s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(InvalidRenderId(s.to_string()))
        }
    }
}

impl TryFrom<String> for RenderId {
    type Error = InvalidRenderId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RenderId> for String {
    fn from(id: RenderId) -> Self {
        id.0
    }
}

/// Submission record, written once to `request.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub render_id: RenderId,
    /// Raw script as submitted.
    pub script: String,
    pub settings: RenderSettings,
    /// Hash of the whitespace-normalised script.
    pub script_hash: String,
    /// Hash of the canonical settings JSON.
    pub settings_hash: String,
    pub submitted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_and_valid() {
        let a = RenderId::generate();
        let b = RenderId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("r_"));
        assert_eq!(a.as_str().parse::<RenderId>().unwrap(), a);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        assert!("../etc".parse::<RenderId>().is_err());
        assert!("a/b".parse::<RenderId>().is_err());
        assert!("".parse::<RenderId>().is_err());
        assert!("job-42_ok".parse::<RenderId>().is_ok());
    }

    #[test]
    fn test_serde_validates_on_deserialize() {
        let id: RenderId = serde_json::from_str("\"abc_123\"").unwrap();
        assert_eq!(id.to_string(), "abc_123");
        assert!(serde_json::from_str::<RenderId>("\"bad id\"").is_err());
    }
}
