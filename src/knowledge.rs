use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A single reference document that can be injected into task prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// 1..=10, higher wins ties during contextual selection.
    pub priority: u8,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateKnowledgeRequest {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateKnowledgeRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub priority: Option<u8>,
    pub active: Option<bool>,
}

/// In-memory registry of knowledge sources with keyword-based retrieval.
///
/// Nothing is preloaded; sources arrive through the API and live for the
/// process lifetime.
#[derive(Default)]
pub struct KnowledgeManager {
    sources: RwLock<HashMap<Uuid, KnowledgeSource>>,
}

impl KnowledgeManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, req: CreateKnowledgeRequest) -> KnowledgeSource {
        let now = Utc::now();
        let source = KnowledgeSource {
            id: Uuid::new_v4(),
            title: req.title,
            content: req.content,
            category: req.category.unwrap_or_else(|| "general".to_string()),
            tags: req.tags.unwrap_or_default(),
            priority: req.priority.unwrap_or(5).clamp(1, 10),
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.sources.write().await.insert(source.id, source.clone());
        source
    }

    pub async fn get(&self, id: Uuid) -> Option<KnowledgeSource> {
        self.sources.read().await.get(&id).cloned()
    }

    /// All sources, highest priority first.
    pub async fn list(&self) -> Vec<KnowledgeSource> {
        let mut sources: Vec<_> = self.sources.read().await.values().cloned().collect();
        sources.sort_by(|a, b| b.priority.cmp(&a.priority));
        sources
    }

    pub async fn active(&self) -> Vec<KnowledgeSource> {
        let mut sources: Vec<_> = self
            .sources
            .read()
            .await
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect();
        sources.sort_by(|a, b| b.priority.cmp(&a.priority));
        sources
    }

    pub async fn update(&self, id: Uuid, req: UpdateKnowledgeRequest) -> Option<KnowledgeSource> {
        let mut sources = self.sources.write().await;
        let source = sources.get_mut(&id)?;
        if let Some(title) = req.title {
            source.title = title;
        }
        if let Some(content) = req.content {
            source.content = content;
        }
        if let Some(category) = req.category {
            source.category = category;
        }
        if let Some(tags) = req.tags {
            source.tags = tags;
        }
        if let Some(priority) = req.priority {
            source.priority = priority.clamp(1, 10);
        }
        if let Some(active) = req.active {
            source.active = active;
        }
        source.updated_at = Utc::now();
        Some(source.clone())
    }

    pub async fn delete(&self, id: Uuid) -> bool {
        self.sources.write().await.remove(&id).is_some()
    }

    /// Case-insensitive substring search over title, content, tags and
    /// category of active sources.
    pub async fn search(&self, query: &str) -> Vec<KnowledgeSource> {
        let needle = query.to_lowercase();
        self.active()
            .await
            .into_iter()
            .filter(|s| {
                s.title.to_lowercase().contains(&needle)
                    || s.content.to_lowercase().contains(&needle)
                    || s.tags.iter().any(|t| t.to_lowercase().contains(&needle))
                    || s.category.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// Picks the sources most relevant to a prompt and formats them as a
    /// block that can be appended to the prompt before generation.
    ///
    /// Scoring is plain word overlap: each prompt word longer than three
    /// characters earns 2 points on a content hit and 3 on a title hit,
    /// and the source priority is added on top. Returns an empty string
    /// when nothing is active.
    pub async fn contextual(&self, prompt: &str, max_sources: usize) -> String {
        let active = self.active().await;
        if active.is_empty() || max_sources == 0 {
            return String::new();
        }

        let prompt_lower = prompt.to_lowercase();
        let words: Vec<&str> = prompt_lower
            .split_whitespace()
            .filter(|w| w.len() > 3)
            .collect();

        let mut scored: Vec<(u32, KnowledgeSource)> = active
            .into_iter()
            .map(|source| {
                let content = source.content.to_lowercase();
                let title = source.title.to_lowercase();
                let mut score = source.priority as u32;
                for word in &words {
                    if content.contains(word) {
                        score += 2;
                    }
                    if title.contains(word) {
                        score += 3;
                    }
                }
                (score, source)
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let block: Vec<String> = scored
            .into_iter()
            .take(max_sources)
            .map(|(_, s)| format!("**{}** ({}):\n{}", s.title, s.category, s.content))
            .collect();
        if block.is_empty() {
            return String::new();
        }
        format!("\n\n## Relevant Knowledge\n\n{}\n\n", block.join("\n\n"))
    }
}
