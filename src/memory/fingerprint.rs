//! Deterministic fingerprints for emotion vectors and contexts.

use super::EmotionVector;
use sha2::{Digest, Sha256};

/// Hash an emotion vector into a short hex fingerprint.
///
/// Components are rounded to three decimals before hashing so that
/// float noise does not change the identity of an event.
pub fn emotion_fingerprint(emotion: &EmotionVector, hash_length: usize) -> String {
    let serialized = serialize_emotion(emotion);
    truncate_digest(serialized.as_bytes(), hash_length)
}

/// Hash a context string, normalized to lowercase single-spaced text.
pub fn context_fingerprint(context: &str, hash_length: usize) -> String {
    let normalized = normalize_context(context);
    truncate_digest(normalized.as_bytes(), hash_length)
}

/// Check that a value looks like a fingerprint of the given byte length.
pub fn is_valid_fingerprint(value: &str, hash_length: usize) -> bool {
    value.len() == hash_length * 2
        && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn serialize_emotion(emotion: &EmotionVector) -> String {
    format!(
        "v:{:.3},a:{:.3},d:{:.3},c:{:.3},t:{}",
        emotion.valence,
        emotion.arousal,
        emotion.dominance,
        emotion.confidence,
        emotion.timestamp.to_rfc3339()
    )
}

fn normalize_context(context: &str) -> String {
    context
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_digest(bytes: &[u8], hash_length: usize) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..hash_length.min(digest.len())])
}
