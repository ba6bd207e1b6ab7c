//! Task persistence backends.
//!
//! Three implementations behind one trait: in-memory for tests and
//! ephemeral runs, a JSON snapshot file, and SQLite for production.

use super::{Task, TaskEvent, TaskFilter, TaskStatus, TaskType};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Storage backend for tasks and their event timelines.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Whether data survives a process restart.
    fn is_persistent(&self) -> bool;

    /// List tasks matching the filter, newest first.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, String>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String>;

    /// Insert or replace a task.
    async fn save_task(&self, task: &Task) -> Result<(), String>;

    /// Returns true when a task was actually removed.
    async fn delete_task(&self, id: Uuid) -> Result<bool, String>;

    async fn log_event(&self, event: &TaskEvent) -> Result<(), String>;

    /// Events for one task in insertion order.
    async fn get_events(&self, task_id: Uuid) -> Result<Vec<TaskEvent>, String>;

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}

fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store backed by hash maps. Used by tests and `FLUI_TASK_STORE=memory`.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
    events: Arc<RwLock<HashMap<Uuid, Vec<TaskEvent>>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, String> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), String> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, String> {
        let removed = self.tasks.write().await.remove(&id).is_some();
        self.events.write().await.remove(&id);
        Ok(removed)
    }

    async fn log_event(&self, event: &TaskEvent) -> Result<(), String> {
        self.events
            .write()
            .await
            .entry(event.task_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn get_events(&self, task_id: Uuid) -> Result<Vec<TaskEvent>, String> {
        Ok(self
            .events
            .read()
            .await
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

#[derive(serde::Serialize, serde::Deserialize, Default)]
struct TaskStoreSnapshot {
    tasks: HashMap<Uuid, Task>,
    events: HashMap<Uuid, Vec<TaskEvent>>,
}

/// Single-file JSON store with an in-memory cache.
#[derive(Clone)]
pub struct FileTaskStore {
    path: PathBuf,
    tasks: Arc<RwLock<HashMap<Uuid, Task>>>,
    events: Arc<RwLock<HashMap<Uuid, Vec<TaskEvent>>>>,
    persist_lock: Arc<Mutex<()>>,
}

impl FileTaskStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, String> {
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| format!("Failed to create task store dir: {}", e))?;
        let path = base_dir.join("tasks.json");
        let snapshot = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<TaskStoreSnapshot>(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!("Failed to parse task store {}: {}", path.display(), e);
                    TaskStoreSnapshot::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => TaskStoreSnapshot::default(),
            Err(err) => {
                tracing::warn!("Failed to read task store {}: {}", path.display(), err);
                TaskStoreSnapshot::default()
            }
        };

        Ok(Self {
            path,
            tasks: Arc::new(RwLock::new(snapshot.tasks)),
            events: Arc::new(RwLock::new(snapshot.events)),
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn persist(&self) -> Result<(), String> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = TaskStoreSnapshot {
            tasks: self.tasks.read().await.clone(),
            events: self.events.read().await.clone(),
        };
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| format!("Failed to serialize task store: {}", e))?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data)
            .await
            .map_err(|e| format!("Failed to write task store: {}", e))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| format!("Failed to finalize task store: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FileTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, String> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        sort_newest_first(&mut tasks);
        Ok(tasks)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<(), String> {
        self.tasks.write().await.insert(task.id, task.clone());
        self.persist().await
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, String> {
        let removed = self.tasks.write().await.remove(&id).is_some();
        self.events.write().await.remove(&id);
        if removed {
            self.persist().await?;
        }
        Ok(removed)
    }

    async fn log_event(&self, event: &TaskEvent) -> Result<(), String> {
        self.events
            .write()
            .await
            .entry(event.task_id)
            .or_default()
            .push(event.clone());
        self.persist().await
    }

    async fn get_events(&self, task_id: Uuid) -> Result<Vec<TaskEvent>, String> {
        Ok(self
            .events
            .read()
            .await
            .get(&task_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    task_type TEXT NOT NULL,
    prompt TEXT NOT NULL,
    status TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    retries INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    max_depth INTEGER NOT NULL DEFAULT 5,
    parent_task_id TEXT,
    child_tasks TEXT,
    metadata TEXT,
    result TEXT,
    error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS task_events (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    task_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    data TEXT
);

CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at);
CREATE INDEX IF NOT EXISTS idx_task_events_task ON task_events(task_id);
"#;

fn status_to_string(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Completed => "completed",
        TaskStatus::Failed => "failed",
    }
}

fn parse_status(s: &str) -> TaskStatus {
    match s {
        "running" => TaskStatus::Running,
        "completed" => TaskStatus::Completed,
        "failed" => TaskStatus::Failed,
        _ => TaskStatus::Pending,
    }
}

fn task_type_to_string(task_type: TaskType) -> &'static str {
    match task_type {
        TaskType::Conversation => "conversation",
        TaskType::ImageGeneration => "image_generation",
        TaskType::TextGeneration => "text_generation",
        TaskType::AudioGeneration => "audio_generation",
        TaskType::CompositeTask => "composite_task",
        TaskType::GenericTask => "generic_task",
    }
}

fn parse_task_type(s: &str) -> TaskType {
    match s {
        "conversation" => TaskType::Conversation,
        "image_generation" => TaskType::ImageGeneration,
        "text_generation" => TaskType::TextGeneration,
        "audio_generation" => TaskType::AudioGeneration,
        "composite_task" => TaskType::CompositeTask,
        _ => TaskType::GenericTask,
    }
}

fn parse_datetime(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let id_str: String = row.get(0)?;
    let task_type_str: String = row.get(1)?;
    let status_str: String = row.get(3)?;
    let parent_str: Option<String> = row.get(8)?;
    let child_tasks_json: Option<String> = row.get(9)?;
    let metadata_json: Option<String> = row.get(10)?;
    let result_json: Option<String> = row.get(11)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;
    let completed_at: Option<String> = row.get(15)?;

    Ok(Task {
        id: Uuid::parse_str(&id_str).unwrap_or_default(),
        task_type: parse_task_type(&task_type_str),
        prompt: row.get(2)?,
        status: parse_status(&status_str),
        depth: row.get::<_, i64>(4)? as u32,
        retries: row.get::<_, i64>(5)? as u32,
        max_retries: row.get::<_, i64>(6)? as u32,
        max_depth: row.get::<_, i64>(7)? as u32,
        parent_task_id: parent_str.and_then(|s| Uuid::parse_str(&s).ok()),
        child_tasks: child_tasks_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        metadata: metadata_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| serde_json::json!({})),
        result: result_json.and_then(|s| serde_json::from_str(&s).ok()),
        error: row.get(12)?,
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
        completed_at: completed_at.as_deref().map(parse_datetime),
    })
}

const TASK_COLUMNS: &str = "id, task_type, prompt, status, depth, retries, max_retries, max_depth, \
                            parent_task_id, child_tasks, metadata, result, error, \
                            created_at, updated_at, completed_at";

/// SQLite-backed store. All queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    pub async fn new(base_dir: PathBuf) -> Result<Self, String> {
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| format!("Failed to create task store dir: {}", e))?;
        let db_path = base_dir.join("flui.db");

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, String> {
            let conn = Connection::open(&db_path)
                .map_err(|e| format!("Failed to open {}: {}", db_path.display(), e))?;
            conn.execute_batch(SCHEMA)
                .map_err(|e| format!("Failed to initialize schema: {}", e))?;
            Ok(conn)
        })
        .await
        .map_err(|e| e.to_string())??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, String> {
        let conn = self.conn.clone();
        let filter = filter.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM tasks ORDER BY created_at DESC",
                    TASK_COLUMNS
                ))
                .map_err(|e| e.to_string())?;

            let tasks = stmt
                .query_map([], row_to_task)
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;

            Ok(tasks.into_iter().filter(|t| filter.matches(t)).collect())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, String> {
        let conn = self.conn.clone();
        let id_str = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM tasks WHERE id = ?1",
                    TASK_COLUMNS
                ))
                .map_err(|e| e.to_string())?;

            stmt.query_row(params![&id_str], row_to_task)
                .optional()
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn save_task(&self, task: &Task) -> Result<(), String> {
        let conn = self.conn.clone();
        let task = task.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let child_tasks = serde_json::to_string(&task.child_tasks).map_err(|e| e.to_string())?;
            let metadata = serde_json::to_string(&task.metadata).map_err(|e| e.to_string())?;
            let result = task
                .result
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| e.to_string())?;

            conn.execute(
                "INSERT OR REPLACE INTO tasks (id, task_type, prompt, status, depth, retries,
                        max_retries, max_depth, parent_task_id, child_tasks, metadata, result,
                        error, created_at, updated_at, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    task.id.to_string(),
                    task_type_to_string(task.task_type),
                    task.prompt,
                    status_to_string(task.status),
                    task.depth as i64,
                    task.retries as i64,
                    task.max_retries as i64,
                    task.max_depth as i64,
                    task.parent_task_id.map(|id| id.to_string()),
                    child_tasks,
                    metadata,
                    result,
                    task.error,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                    task.completed_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .map_err(|e| e.to_string())?;

            Ok(())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn delete_task(&self, id: Uuid) -> Result<bool, String> {
        let conn = self.conn.clone();
        let id_str = id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.execute("DELETE FROM task_events WHERE task_id = ?1", params![&id_str])
                .map_err(|e| e.to_string())?;
            let affected = conn
                .execute("DELETE FROM tasks WHERE id = ?1", params![&id_str])
                .map_err(|e| e.to_string())?;
            Ok(affected > 0)
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn log_event(&self, event: &TaskEvent) -> Result<(), String> {
        let conn = self.conn.clone();
        let event = event.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let data = serde_json::to_string(&event.data).map_err(|e| e.to_string())?;
            conn.execute(
                "INSERT INTO task_events (id, task_id, event_type, timestamp, data)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    event.id.to_string(),
                    event.task_id.to_string(),
                    event.event_type,
                    event.timestamp.to_rfc3339(),
                    data,
                ],
            )
            .map_err(|e| e.to_string())?;
            Ok(())
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn get_events(&self, task_id: Uuid) -> Result<Vec<TaskEvent>, String> {
        let conn = self.conn.clone();
        let id_str = task_id.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, task_id, event_type, timestamp, data
                     FROM task_events WHERE task_id = ?1 ORDER BY sequence ASC",
                )
                .map_err(|e| e.to_string())?;

            let events = stmt
                .query_map(params![&id_str], |row| {
                    let id_str: String = row.get(0)?;
                    let task_id_str: String = row.get(1)?;
                    let timestamp: String = row.get(3)?;
                    let data_json: Option<String> = row.get(4)?;

                    Ok(TaskEvent {
                        id: Uuid::parse_str(&id_str).unwrap_or_default(),
                        task_id: Uuid::parse_str(&task_id_str).unwrap_or_default(),
                        event_type: row.get(2)?,
                        timestamp: parse_datetime(&timestamp),
                        data: data_json
                            .and_then(|s| serde_json::from_str(&s).ok())
                            .unwrap_or(serde_json::Value::Null),
                    })
                })
                .map_err(|e| e.to_string())?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| e.to_string())?;

            Ok(events)
        })
        .await
        .map_err(|e| e.to_string())?
    }

    async fn health_check(&self) -> Result<(), String> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            conn.query_row("SELECT 1", [], |_| Ok(()))
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| e.to_string())?
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Task store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStoreKind {
    Memory,
    #[default]
    File,
    Sqlite,
}

impl TaskStoreKind {
    /// Parse from environment variable value.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "file" | "json" => Self::File,
            "sqlite" | "db" => Self::Sqlite,
            _ => Self::default(),
        }
    }
}

/// Create a task store based on kind and data directory.
pub async fn create_task_store(
    kind: TaskStoreKind,
    base_dir: PathBuf,
) -> Result<Box<dyn TaskStore>, String> {
    match kind {
        TaskStoreKind::Memory => Ok(Box::new(InMemoryTaskStore::new())),
        TaskStoreKind::File => {
            let store = FileTaskStore::new(base_dir).await?;
            Ok(Box::new(store))
        }
        TaskStoreKind::Sqlite => {
            let store = SqliteTaskStore::new(base_dir).await?;
            Ok(Box::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task(prompt: &str) -> Task {
        Task::new(prompt, TaskType::TextGeneration, 5, 3)
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = InMemoryTaskStore::new();
        let task = sample_task("hello");
        store.save_task(&task).await.unwrap();

        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.prompt, "hello");

        assert!(store.delete_task(task.id).await.unwrap());
        assert!(store.get_task(task.id).await.unwrap().is_none());
        assert!(!store.delete_task(task.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_applies_filter_and_order() {
        let store = InMemoryTaskStore::new();
        let mut first = sample_task("first");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        let mut second = sample_task("second");
        second.mark_running();
        store.save_task(&first).await.unwrap();
        store.save_task(&second).await.unwrap();

        let all = store.list_tasks(&TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].prompt, "second");

        let running = store
            .list_tasks(&TaskFilter {
                status: Some(TaskStatus::Running),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].prompt, "second");
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let task = sample_task("persisted");

        {
            let store = FileTaskStore::new(dir.path().to_path_buf()).await.unwrap();
            store.save_task(&task).await.unwrap();
            store
                .log_event(&TaskEvent::new(
                    task.id,
                    "created",
                    serde_json::json!({"via": "test"}),
                ))
                .await
                .unwrap();
        }

        let store = FileTaskStore::new(dir.path().to_path_buf()).await.unwrap();
        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.prompt, "persisted");
        let events = store.get_events(task.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "created");
    }

    #[tokio::test]
    async fn test_file_store_empty_dir_starts_clean() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTaskStore::new(dir.path().to_path_buf()).await.unwrap();
        assert!(store
            .list_tasks(&TaskFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTaskStore::new(dir.path().to_path_buf())
            .await
            .unwrap();

        let mut task = sample_task("sqlite task");
        task.complete_with(super::super::TaskResult::ok(
            serde_json::json!({"answer": 42}),
        ));
        store.save_task(&task).await.unwrap();

        let loaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Completed);
        assert_eq!(
            loaded.result.unwrap().data,
            Some(serde_json::json!({"answer": 42}))
        );

        // Upsert keeps a single row
        store.save_task(&task).await.unwrap();
        let all = store.list_tasks(&TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);

        assert!(store.delete_task(task.id).await.unwrap());
        assert!(store.get_task(task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_events_keep_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteTaskStore::new(dir.path().to_path_buf())
            .await
            .unwrap();
        let task = sample_task("evented");
        store.save_task(&task).await.unwrap();

        for event_type in ["created", "started", "completed"] {
            store
                .log_event(&TaskEvent::new(task.id, event_type, serde_json::Value::Null))
                .await
                .unwrap();
        }

        let events = store.get_events(task.id).await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["created", "started", "completed"]);
    }

    #[test]
    fn test_store_kind_from_str() {
        assert_eq!(TaskStoreKind::from_str("memory"), TaskStoreKind::Memory);
        assert_eq!(TaskStoreKind::from_str("SQLITE"), TaskStoreKind::Sqlite);
        assert_eq!(TaskStoreKind::from_str("json"), TaskStoreKind::File);
        assert_eq!(TaskStoreKind::from_str("bogus"), TaskStoreKind::File);
    }
}
