//! Content hashing for cache keys and request identity.
//!
//! All digests are lowercase hex SHA-256. Inputs are normalised before
//! hashing so that cosmetic differences (whitespace, key order) never
//! produce a different key.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::settings::VoiceSettings;

/// Length of every digest produced by this module, in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Hash raw bytes into a fixed-length hex digest.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{digest:x}")
}

/// Normalise script whitespace.
///
/// Line endings become `\n`, every whitespace run that contains a line
/// break collapses to a single `\n`, every other run collapses to a single
/// space, and both ends are trimmed.
#[must_use]
pub fn normalize_script(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut pending: Option<char> = None;

    for c in text.chars() {
        if c.is_whitespace() {
            pending = match (pending, c) {
                (Some('\n'), _) | (_, '\n') => Some('\n'),
                _ => Some(' '),
            };
            continue;
        }
        if let Some(ws) = pending.take() {
            if !out.is_empty() {
                out.push(ws);
            }
        }
        out.push(c);
    }

    out
}

/// Hash a script after whitespace normalisation.
#[must_use]
pub fn script_hash(text: &str) -> String {
    hash_bytes(normalize_script(text).as_bytes())
}

/// Hash an arbitrary JSON settings object with lexicographically sorted keys.
#[must_use]
pub fn settings_hash(settings: &Value) -> String {
    hash_bytes(canonical_json(settings).as_bytes())
}

/// Hash any serialisable settings type via its canonical JSON form.
pub fn settings_hash_of<T: Serialize>(settings: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(settings)?;
    Ok(settings_hash(&value))
}

/// Cache key for one chunk: the synthesizable content, the voice settings
/// and the PCM sample rate requested from the engine.
pub fn chunk_hash(
    content: &str,
    voice: &VoiceSettings,
    sample_rate: u32,
) -> Result<String, serde_json::Error> {
    let voice = serde_json::to_value(voice)?;
    let mut hasher = Sha256::new();
    hasher.update(b"chunk:v2\n");
    hasher.update(content.as_bytes());
    // NUL separator keeps ("ab", "c") and ("a", "bc") style splits distinct.
    hasher.update([0u8]);
    hasher.update(canonical_json(&voice).as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("pcm_{sample_rate}").as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialise a JSON value with object keys sorted at every depth.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_bytes_is_fixed_length_hex() {
        let digest = hash_bytes(b"hello");
        assert_eq!(digest.len(), DIGEST_HEX_LEN);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_single_bit_change_changes_digest() {
        assert_ne!(hash_bytes(b"narration"), hash_bytes(b"narratioo"));
        assert_ne!(hash_bytes(&[0b0000_0000]), hash_bytes(&[0b0000_0001]));
    }

    #[test]
    fn test_normalize_script_collapses_whitespace() {
        assert_eq!(normalize_script("  Hello   world.  "), "Hello world.");
        assert_eq!(normalize_script("a\t\tb"), "a b");
        assert_eq!(normalize_script("a\r\n\r\nb"), "a\nb");
        assert_eq!(normalize_script("a \n  b"), "a\nb");
    }

    #[test]
    fn test_script_hash_ignores_cosmetic_whitespace() {
        let a = "Hello world.\nSecond line.";
        let b = "Hello    world.\r\n\r\nSecond   line.  ";
        let c = "\tHello world.\rSecond line.";
        assert_eq!(script_hash(a), script_hash(b));
        assert_eq!(script_hash(a), script_hash(c));
        assert_ne!(script_hash(a), script_hash("Hello world. Second line!"));
    }

    #[test]
    fn test_settings_hash_is_key_order_independent() {
        let a = json!({"voice": {"id": "v1", "speed": 1.0}, "format": "wav", "crossfade": 80});
        let b = json!({"crossfade": 80, "format": "wav", "voice": {"speed": 1.0, "id": "v1"}});
        assert_eq!(settings_hash(&a), settings_hash(&b));

        let c = json!({"crossfade": 81, "format": "wav", "voice": {"speed": 1.0, "id": "v1"}});
        assert_ne!(settings_hash(&a), settings_hash(&c));
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"b": [{"z": 1, "a": 2}], "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","b":[{"a":2,"z":1}]}"#);
    }

    #[test]
    fn test_chunk_hash_depends_on_text_voice_and_rate() {
        let voice = VoiceSettings::default();
        let base = chunk_hash("Hello world.", &voice, 44_100).unwrap();
        assert_eq!(base, chunk_hash("Hello world.", &voice, 44_100).unwrap());
        assert_ne!(base, chunk_hash("Hello world!", &voice, 44_100).unwrap());
        assert_ne!(base, chunk_hash("Hello world.", &voice, 16_000).unwrap());

        let other_voice = VoiceSettings {
            stability: voice.stability + 0.1,
            ..voice.clone()
        };
        assert_ne!(base, chunk_hash("Hello world.", &other_voice, 44_100).unwrap());

        let other_id = VoiceSettings {
            voice_id: "another".to_string(),
            ..voice
        };
        assert_ne!(base, chunk_hash("Hello world.", &other_id, 44_100).unwrap());
    }
}
