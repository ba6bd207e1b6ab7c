//! In-memory episodic store with intensity gating and decayed recall.

use super::fingerprint::emotion_fingerprint;
use super::{EmotionVector, EpisodicMemory, MemoryConfig, MemoryRecall, Outcome, PolicyDelta};
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Memories keyed by emotion fingerprint.
pub struct EpisodicStore {
    config: MemoryConfig,
    memories: RwLock<HashMap<String, EpisodicMemory>>,
}

impl EpisodicStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            memories: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Store an event if its emotion clears the intensity threshold.
    /// Returns the stored memory, or None when the event was too mild.
    pub async fn store(
        &self,
        emotion: EmotionVector,
        outcome: Outcome,
        policy_delta: PolicyDelta,
        context: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Option<EpisodicMemory> {
        if emotion.intensity() < self.config.emotion_threshold {
            return None;
        }

        let fingerprint = emotion_fingerprint(&emotion, self.config.hash_length);
        let now = Utc::now();
        let memory = EpisodicMemory {
            fingerprint: fingerprint.clone(),
            emotion,
            outcome,
            policy_delta,
            context: context.into(),
            task_id: task_id.into(),
            created_at: now,
            last_accessed: now,
            access_count: 0,
        };

        let mut memories = self.memories.write().await;
        memories.insert(fingerprint, memory.clone());
        evict_over_cap(&mut memories, self.config.max_memories);

        Some(memory)
    }

    /// Recall memories whose decayed relevance clears the threshold,
    /// highest first. Hits are touched.
    pub async fn recall(&self, context: &str, threshold: f64) -> Vec<MemoryRecall> {
        let now = Utc::now();
        let mut memories = self.memories.write().await;
        let mut hits = Vec::new();

        for memory in memories.values_mut() {
            let relevance = keyword_relevance(memory, context);
            let days_idle = (now - memory.last_accessed).num_seconds() as f64 / 86_400.0;
            let decay = self.config.memory_decay.powf(days_idle.max(0.0));
            let score = relevance * decay;

            if score >= threshold {
                memory.last_accessed = now;
                memory.access_count += 1;
                hits.push(MemoryRecall {
                    fingerprint: memory.fingerprint.clone(),
                    policy_delta: memory.policy_delta.clone(),
                    relevance: score,
                    memory: memory.compress(),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits
    }

    /// Fetch one memory by fingerprint, touching its access stats.
    pub async fn get(&self, fingerprint: &str) -> Option<EpisodicMemory> {
        let mut memories = self.memories.write().await;
        let memory = memories.get_mut(fingerprint)?;
        memory.last_accessed = Utc::now();
        memory.access_count += 1;
        Some(memory.clone())
    }

    pub async fn len(&self) -> usize {
        self.memories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.memories.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<EpisodicMemory> {
        self.memories.read().await.values().cloned().collect()
    }

    pub async fn clear(&self) {
        self.memories.write().await.clear();
    }
}

/// Keyword overlap between the query context and a memory. Words matching
/// the policy category count double; normalized by the larger word count.
fn keyword_relevance(memory: &EpisodicMemory, context: &str) -> f64 {
    let context_lower = context.to_lowercase();
    let memory_lower = memory.context.to_lowercase();
    let policy_lower = memory.policy_delta.context.to_lowercase();

    let context_words: Vec<&str> = context_lower.split_whitespace().collect();
    let memory_words: Vec<&str> = memory_lower.split_whitespace().collect();
    let policy_words: Vec<&str> = policy_lower.split_whitespace().collect();

    let mut matches = 0usize;
    for word in &context_words {
        if memory_words.contains(word) {
            matches += 1;
        }
        if policy_words.contains(word) {
            matches += 2;
        }
    }

    let total = context_words.len().max(memory_words.len());
    if total == 0 {
        return 0.0;
    }
    (matches as f64 / total as f64).min(1.0)
}

fn evict_over_cap(memories: &mut HashMap<String, EpisodicMemory>, max_memories: usize) {
    if memories.len() <= max_memories {
        return;
    }
    let mut by_age: Vec<(String, chrono::DateTime<Utc>)> = memories
        .iter()
        .map(|(k, m)| (k.clone(), m.last_accessed))
        .collect();
    by_age.sort_by(|a, b| a.1.cmp(&b.1));

    let excess = memories.len() - max_memories;
    for (fingerprint, _) in by_age.into_iter().take(excess) {
        memories.remove(&fingerprint);
    }
}
