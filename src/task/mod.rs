//! Task model and persistence.
//!
//! A task is one unit of orchestrated work: classified from a prompt,
//! executed by the worker, optionally delegated into child tasks. Stores
//! live in [`store`], execution-context snapshots in [`context`].

pub mod context;
pub mod store;

pub use context::ContextPersistence;
pub use store::{
    create_task_store, FileTaskStore, InMemoryTaskStore, SqliteTaskStore, TaskStore, TaskStoreKind,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What kind of work a prompt asks for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Conversation,
    ImageGeneration,
    TextGeneration,
    AudioGeneration,
    CompositeTask,
    GenericTask,
}

/// Result payload of an executed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl TaskResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A unit of orchestrated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub prompt: String,
    pub status: TaskStatus,
    /// Delegation depth; 0 for tasks created directly from user input
    pub depth: u32,
    pub retries: u32,
    pub max_retries: u32,
    pub max_depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_tasks: Vec<Uuid>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(prompt: impl Into<String>, task_type: TaskType, max_depth: u32, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_type,
            prompt: prompt.into(),
            status: TaskStatus::Pending,
            depth: 0,
            retries: 0,
            max_retries,
            max_depth,
            parent_task_id: None,
            child_tasks: Vec::new(),
            metadata: serde_json::json!({}),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Build a child task one level deeper than its parent.
    pub fn child_of(parent: &Task, prompt: impl Into<String>, task_type: TaskType) -> Self {
        let mut task = Task::new(prompt, task_type, parent.max_depth, parent.max_retries);
        task.depth = parent.depth + 1;
        task.parent_task_id = Some(parent.id);
        task
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn complete_with(&mut self, result: TaskResult) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        let now = Utc::now();
        self.updated_at = now;
        self.completed_at = Some(now);
    }

    pub fn fail_with(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Coarse progress estimate for status endpoints.
    pub fn progress_percent(&self) -> u8 {
        match self.status {
            TaskStatus::Completed => 100,
            TaskStatus::Running => 50,
            TaskStatus::Pending | TaskStatus::Failed => 0,
        }
    }

    /// Rough time-remaining estimate; deeper tasks get more slack.
    pub fn estimated_remaining(&self) -> Duration {
        Duration::from_secs(30) * 2u32.saturating_pow(self.depth)
    }
}

/// Append-only event on a task's timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub id: Uuid,
    pub task_id: Uuid,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl TaskEvent {
    pub fn new(task_id: Uuid, event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            event_type: event_type.into(),
            timestamp: Utc::now(),
            data,
        }
    }
}

/// Filter for task listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    #[serde(rename = "type")]
    pub task_type: Option<TaskType>,
    pub depth: Option<u32>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        if let Some(depth) = self.depth {
            if task.depth != depth {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lifecycle() {
        let mut task = Task::new("write a poem", TaskType::TextGeneration, 5, 3);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress_percent(), 0);
        assert!(!task.is_terminal());

        task.mark_running();
        assert_eq!(task.progress_percent(), 50);

        task.complete_with(TaskResult::ok(serde_json::json!({"text": "roses are red"})));
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress_percent(), 100);
        assert!(task.is_terminal());
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_child_task_inherits_ceilings() {
        let parent = Task::new("build a site", TaskType::CompositeTask, 5, 3);
        let child = Task::child_of(&parent, "write the html", TaskType::GenericTask);

        assert_eq!(child.depth, 1);
        assert_eq!(child.parent_task_id, Some(parent.id));
        assert_eq!(child.max_depth, 5);
        assert_eq!(child.max_retries, 3);
    }

    #[test]
    fn test_estimated_remaining_grows_with_depth() {
        let parent = Task::new("plan", TaskType::CompositeTask, 5, 3);
        let child = Task::child_of(&parent, "step", TaskType::GenericTask);

        assert_eq!(parent.estimated_remaining(), Duration::from_secs(30));
        assert_eq!(child.estimated_remaining(), Duration::from_secs(60));
    }

    #[test]
    fn test_filter_matches() {
        let mut task = Task::new("hello", TaskType::Conversation, 5, 3);
        task.mark_running();

        let filter = TaskFilter {
            status: Some(TaskStatus::Running),
            task_type: Some(TaskType::Conversation),
            depth: None,
        };
        assert!(filter.matches(&task));

        let filter = TaskFilter {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert!(!filter.matches(&task));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TaskStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        let json = serde_json::to_string(&TaskType::ImageGeneration).unwrap();
        assert_eq!(json, "\"image_generation\"");
    }
}
