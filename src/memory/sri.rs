//! SRI protocol: strip, recall, inject.
//!
//! Before an LLM call the full conversation is stripped down to its last
//! few turns, relevant memories are recalled against it, and their
//! compressed one-liners are appended under a `## Relevant Memories:`
//! heading. The result reports token estimates so the optimization can be
//! measured.

use super::store::EpisodicStore;
use super::{EmotionVector, MemoryConfig, MemoryRecall, Outcome, PolicyDelta};
use crate::llm::ChatMessage;
use crate::task::TaskResult;
use serde::Serialize;
use std::sync::Arc;

/// Minimum decayed relevance for a memory to be injected.
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.7;

/// Prompt categories recognized when deriving a policy delta.
const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("altcoin", "altcoin"),
    ("cryptocurrency", "crypto"),
    ("bitcoin", "crypto"),
    ("crypto", "crypto"),
    ("investment", "financial_advice"),
    ("financial", "financial_advice"),
    ("money", "financial_advice"),
    ("design", "design"),
    ("logo", "design"),
    ("image", "design"),
    ("code", "programming"),
    ("programming", "programming"),
    ("development", "programming"),
];

/// Outcome of one optimization pass.
#[derive(Debug, Clone, Serialize)]
pub struct SriResult {
    pub original_tokens: usize,
    pub optimized_tokens: usize,
    /// Rounded percentage; negative when injection outgrew the strip
    pub reduction_percentage: i64,
    pub injected_memories: Vec<MemoryRecall>,
    /// Final context ready for the LLM call
    pub context: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OutcomeCounts {
    pub success: usize,
    pub failure: usize,
    pub partial: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub total_memories: usize,
    pub average_valence: f64,
    pub memories_by_outcome: OutcomeCounts,
}

/// Context optimizer bound to an episodic store.
pub struct SriProtocol {
    store: Arc<EpisodicStore>,
    config: MemoryConfig,
}

impl SriProtocol {
    pub fn new(store: Arc<EpisodicStore>, config: MemoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<EpisodicStore> {
        &self.store
    }

    /// Run strip, recall, inject over a conversation. When an agent id is
    /// given, recall queries include it so agent-specific memories surface.
    pub async fn optimize_context(
        &self,
        agent_id: Option<&str>,
        turns: &[ChatMessage],
        task_id: &str,
    ) -> SriResult {
        let full = format_turns(turns);
        let stripped_turns = strip_turns(turns, self.config.context_window);
        let stripped = format_turns(stripped_turns);

        let query = match agent_id {
            Some(agent) => format!("Agent: {}\n{}", agent, full),
            None => stripped.clone(),
        };
        let memories = self.store.recall(&query, DEFAULT_RELEVANCE_THRESHOLD).await;

        let context = inject_memories(&stripped, &memories);
        let original_tokens = estimate_tokens(&full);
        let optimized_tokens = estimate_tokens(&context);

        tracing::debug!(
            task_id = %task_id,
            original_tokens,
            optimized_tokens,
            injected = memories.len(),
            "Optimized context"
        );

        SriResult {
            original_tokens,
            optimized_tokens,
            reduction_percentage: reduction_percentage(original_tokens, optimized_tokens),
            injected_memories: memories,
            context,
        }
    }

    /// Fold a task outcome back into the store. Returns the emotion vector
    /// when the event was intense enough to remember.
    pub async fn record_outcome(
        &self,
        task_id: &str,
        task_context: &str,
        result: &TaskResult,
    ) -> Option<EmotionVector> {
        let confidence = result
            .metadata
            .as_ref()
            .and_then(|m| m.get("confidence"))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5);

        let category = extract_category(task_context);
        let (emotion, outcome, policy_delta) = if result.success {
            (
                EmotionVector::success(confidence),
                Outcome::Success,
                PolicyDelta::reinforce(category),
            )
        } else {
            (
                EmotionVector::failure(confidence),
                Outcome::Failure,
                PolicyDelta::safeguard(category),
            )
        };

        self.store
            .store(emotion, outcome, policy_delta, task_context, task_id)
            .await
            .map(|memory| memory.emotion)
    }

    pub async fn stats(&self) -> MemoryStats {
        let memories = self.store.all().await;
        let total = memories.len();

        let mut counts = OutcomeCounts::default();
        let mut valence_sum = 0.0;
        for memory in &memories {
            valence_sum += memory.emotion.valence;
            match memory.outcome {
                Outcome::Success => counts.success += 1,
                Outcome::Failure => counts.failure += 1,
                Outcome::Partial => counts.partial += 1,
            }
        }

        MemoryStats {
            total_memories: total,
            average_valence: if total == 0 {
                0.0
            } else {
                valence_sum / total as f64
            },
            memories_by_outcome: counts,
        }
    }

    pub async fn clear(&self) {
        self.store.clear().await;
    }
}

/// Keep only the last `window` turns.
fn strip_turns(turns: &[ChatMessage], window: usize) -> &[ChatMessage] {
    if turns.len() <= window {
        turns
    } else {
        &turns[turns.len() - window..]
    }
}

fn format_turns(turns: &[ChatMessage]) -> String {
    turns
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

fn inject_memories(context: &str, memories: &[MemoryRecall]) -> String {
    if memories.is_empty() {
        return context.trim().to_string();
    }
    let mut out = String::from(context);
    out.push_str("\n\n## Relevant Memories:\n");
    for recall in memories {
        out.push_str(&recall.memory);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Rough approximation: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

fn reduction_percentage(original: usize, optimized: usize) -> i64 {
    if original == 0 {
        return 0;
    }
    let saved = original as f64 - optimized as f64;
    (saved / original as f64 * 100.0).round() as i64
}

/// Map a prompt to a coarse policy category.
pub fn extract_category(context: &str) -> &'static str {
    let lower = context.to_lowercase();
    for (keyword, category) in CATEGORY_KEYWORDS {
        if lower.contains(keyword) {
            return category;
        }
    }
    "general"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> SriProtocol {
        let config = MemoryConfig::default();
        SriProtocol::new(Arc::new(EpisodicStore::new(config.clone())), config)
    }

    fn long_conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("tell me about rust"),
            ChatMessage::assistant("rust is a systems language"),
            ChatMessage::user("what about lifetimes"),
            ChatMessage::assistant("lifetimes name borrow scopes"),
            ChatMessage::user("show me an example"),
        ]
    }

    #[tokio::test]
    async fn test_strip_keeps_last_window_turns() {
        let turns = long_conversation();
        let stripped = strip_turns(&turns, 3);
        assert_eq!(stripped.len(), 3);
        assert_eq!(stripped[0].content, "what about lifetimes");
    }

    #[tokio::test]
    async fn test_optimize_reduces_long_context() {
        let sri = protocol();
        let result = sri
            .optimize_context(None, &long_conversation(), "t1")
            .await;

        assert!(result.optimized_tokens < result.original_tokens);
        assert!(result.reduction_percentage > 0);
        assert!(result.injected_memories.is_empty());
        assert!(!result.context.contains("Relevant Memories"));
    }

    #[tokio::test]
    async fn test_optimize_injects_relevant_memory() {
        let sri = protocol();
        sri.record_outcome(
            "t0",
            "crypto altcoin investment question",
            &TaskResult::fail("gave unhedged advice"),
        )
        .await
        .unwrap();

        let turns = vec![ChatMessage::user("crypto altcoin investment question")];
        let result = sri.optimize_context(None, &turns, "t1").await;

        assert_eq!(result.injected_memories.len(), 1);
        assert!(result.context.contains("## Relevant Memories:"));
        assert!(result.context.contains("#mem: altcoin-failed"));
    }

    #[tokio::test]
    async fn test_record_outcome_maps_success_and_failure() {
        let sri = protocol();

        let emotion = sri
            .record_outcome("t1", "design a logo", &TaskResult::ok(serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(emotion.valence, 0.7);

        let emotion = sri
            .record_outcome("t2", "design a logo v2", &TaskResult::fail("boom"))
            .await
            .unwrap();
        assert_eq!(emotion.valence, -0.8);

        let stats = sri.stats().await;
        assert_eq!(stats.total_memories, 2);
        assert_eq!(stats.memories_by_outcome.success, 1);
        assert_eq!(stats.memories_by_outcome.failure, 1);
        assert!((stats.average_valence - (-0.05)).abs() < 1e-9);
    }

    #[test]
    fn test_category_extraction() {
        assert_eq!(extract_category("Should I buy Bitcoin?"), "crypto");
        assert_eq!(extract_category("make me a LOGO"), "design");
        assert_eq!(extract_category("write some code"), "programming");
        assert_eq!(extract_category("what is the weather"), "general");
    }

    #[test]
    fn test_token_estimate_and_reduction() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(reduction_percentage(100, 40), 60);
        assert_eq!(reduction_percentage(100, 120), -20);
        assert_eq!(reduction_percentage(0, 10), 0);
    }
}
