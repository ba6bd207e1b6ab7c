//! Episodic memory with emotion-weighted recall.
//!
//! Task outcomes are folded into VAD (valence/arousal/dominance) emotion
//! vectors; only high-intensity events are remembered. The SRI protocol
//! (strip, recall, inject) trims conversation context and prepends
//! compressed one-liners from relevant memories before an LLM call.

pub mod fingerprint;
pub mod metrics;
pub mod sri;
pub mod store;

pub use fingerprint::{context_fingerprint, emotion_fingerprint, is_valid_fingerprint};
pub use metrics::{
    Alert, AlertSeverity, MetricsCollector, OptimizationRecord, PerformanceSummary, TimeRange,
};
pub use sri::{MemoryStats, OutcomeCounts, SriProtocol, SriResult};
pub use store::EpisodicStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tuning knobs for the episodic store and SRI protocol.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Minimum emotion intensity required to store an event
    pub emotion_threshold: f64,
    /// Cap on stored memories; oldest-accessed are evicted beyond it
    pub max_memories: usize,
    /// Per-day decay applied to recall scores
    pub memory_decay: f64,
    /// Conversation turns kept by the strip step
    pub context_window: usize,
    /// Fingerprint length in bytes before hex encoding
    pub hash_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            emotion_threshold: 0.7,
            max_memories: 1000,
            memory_decay: 0.95,
            context_window: 3,
            hash_length: 8,
        }
    }
}

/// VAD emotion vector attached to a remembered event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionVector {
    /// -1..1, negative to positive
    pub valence: f64,
    /// 0..1, calm to excited
    pub arousal: f64,
    /// 0..1, out of control to in control
    pub dominance: f64,
    /// 0..1, how certain the outcome assessment is
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl EmotionVector {
    /// Calm satisfaction: the canonical vector for a successful task.
    pub fn success(confidence: f64) -> Self {
        Self {
            valence: 0.7,
            arousal: 0.3,
            dominance: 0.8,
            confidence,
            timestamp: Utc::now(),
        }
    }

    /// Frustration: the canonical vector for a failed task.
    pub fn failure(confidence: f64) -> Self {
        Self {
            valence: -0.8,
            arousal: 0.9,
            dominance: 0.2,
            confidence,
            timestamp: Utc::now(),
        }
    }

    /// Euclidean distance from the neutral point (0, 0.5, 0.5),
    /// capped at 1.0.
    pub fn intensity(&self) -> f64 {
        let arousal = self.arousal - 0.5;
        let dominance = self.dominance - 0.5;
        let distance =
            (self.valence * self.valence + arousal * arousal + dominance * dominance).sqrt();
        distance.min(1.0)
    }
}

/// How a remembered task ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    Partial,
}

impl Outcome {
    fn as_word(self) -> &'static str {
        match self {
            Outcome::Success => "succeeded",
            Outcome::Failure => "failed",
            Outcome::Partial => "partial",
        }
    }
}

/// Behavioral adjustment learned from an outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDelta {
    pub action: String,
    /// Keyword category the adjustment applies to
    pub context: String,
    pub impact: f64,
    pub description: String,
}

impl PolicyDelta {
    pub fn reinforce(category: &str) -> Self {
        Self {
            action: "reinforce_approach".to_string(),
            context: category.to_string(),
            impact: 0.7,
            description: format!("Continue using successful approach for {}", category),
        }
    }

    pub fn safeguard(category: &str) -> Self {
        Self {
            action: "add_safeguard".to_string(),
            context: category.to_string(),
            impact: 0.8,
            description: format!("Add safeguards and disclaimers for {}", category),
        }
    }
}

/// One remembered high-intensity event, keyed by its emotion fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodicMemory {
    pub fingerprint: String,
    pub emotion: EmotionVector,
    pub outcome: Outcome,
    pub policy_delta: PolicyDelta,
    pub context: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
}

impl EpisodicMemory {
    /// One-line form injected into prompts.
    pub fn compress(&self) -> String {
        format!(
            "#mem: {}-{} → {}",
            self.policy_delta.context,
            self.outcome.as_word(),
            self.policy_delta.description
        )
    }
}

/// A memory surfaced by recall, scored against the current context.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRecall {
    pub fingerprint: String,
    pub policy_delta: PolicyDelta,
    /// Keyword relevance multiplied by age decay
    pub relevance: f64,
    /// Compressed one-liner ready for injection
    pub memory: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_of_canonical_vectors() {
        // Both canned vectors must clear the default threshold, otherwise
        // no task outcome would ever be remembered.
        let config = MemoryConfig::default();
        assert!(EmotionVector::success(0.5).intensity() >= config.emotion_threshold);
        assert!(EmotionVector::failure(0.5).intensity() >= config.emotion_threshold);
    }

    #[test]
    fn test_neutral_emotion_has_zero_intensity() {
        let neutral = EmotionVector {
            valence: 0.0,
            arousal: 0.5,
            dominance: 0.5,
            confidence: 1.0,
            timestamp: Utc::now(),
        };
        assert_eq!(neutral.intensity(), 0.0);
    }

    #[test]
    fn test_compress_format() {
        let memory = EpisodicMemory {
            fingerprint: "abc123".to_string(),
            emotion: EmotionVector::failure(0.5),
            outcome: Outcome::Failure,
            policy_delta: PolicyDelta::safeguard("crypto"),
            context: "should I buy bitcoin".to_string(),
            task_id: "t1".to_string(),
            created_at: Utc::now(),
            last_accessed: Utc::now(),
            access_count: 0,
        };
        assert_eq!(
            memory.compress(),
            "#mem: crypto-failed → Add safeguards and disclaimers for crypto"
        );
    }
}
