//! Conversational project builder.
//!
//! Keeps one conversation context per user. Free-form input is analysed
//! into an [`Intent`], clarifying questions are asked for missing fields,
//! and a confirmed intent is built into a project by running a todo plan
//! through the tool registry inside a per-project directory. Contexts are
//! snapshotted through [`ContextPersistence`] so a restart picks up where
//! the conversation left off.

pub mod intent;
pub mod todo;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::task::{ContextPersistence, TaskEvent, TaskStore};
use crate::tools::ToolRegistry;

pub use intent::{Complexity, ContextAnalysis, Intent, Question, QuestionType};
pub use todo::{TodoItem, TodoKind, TodoStatus};

/// One message in a user's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: Uuid,
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: role.to_string(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Per-user conversation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub user_id: String,
    pub session_id: Uuid,
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub pending_questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_project: Option<Uuid>,
}

impl ConversationContext {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_id: Uuid::new_v4(),
            history: Vec::new(),
            pending_questions: Vec::new(),
            current_project: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Creating,
    Building,
    Ready,
    Error,
}

impl ProjectStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Creating => "creating",
            ProjectStatus::Building => "building",
            ProjectStatus::Ready => "ready",
            ProjectStatus::Error => "error",
        }
    }
}

/// A generated project and its build record.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub working_directory: String,
    pub status: ProjectStatus,
    pub files: Vec<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationType {
    AddFeature,
    FixBug,
    ModifyExisting,
    RemoveFeature,
}

impl ModificationType {
    fn label(&self) -> &'static str {
        match self {
            ModificationType::AddFeature => "feature addition",
            ModificationType::FixBug => "bug fix",
            ModificationType::ModifyExisting => "modification",
            ModificationType::RemoveFeature => "removal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A change requested against an existing project.
#[derive(Debug, Clone, Serialize)]
pub struct ModificationRequest {
    pub id: Uuid,
    pub project_id: Uuid,
    #[serde(rename = "type")]
    pub modification_type: ModificationType,
    pub description: String,
    pub priority: Priority,
    pub status: ModificationStatus,
    pub created_at: DateTime<Utc>,
}

impl ModificationRequest {
    fn new(project_id: Uuid, modification_type: ModificationType, description: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            modification_type,
            description: description.to_string(),
            priority: Priority::Medium,
            status: ModificationStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

/// What an analysed input looked like to the intent extractor.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub context: ContextAnalysis,
    pub intent: Intent,
    pub questions: Vec<Question>,
    pub confidence: f64,
}

/// Reply to a free-form message routed against the current project.
#[derive(Debug, Clone, Serialize)]
pub struct InteractiveReply {
    pub success: bool,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification: Option<ModificationRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InteractiveReply {
    fn ok(response: String) -> Self {
        Self {
            success: true,
            response,
            modification: None,
            processing: None,
            error: None,
        }
    }
}

/// Drives conversations, intent analysis, and project builds.
pub struct ForgeOrchestrator {
    client: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn TaskStore>,
    persistence: ContextPersistence,
    projects_root: PathBuf,
    contexts: RwLock<HashMap<String, ConversationContext>>,
    projects: RwLock<HashMap<Uuid, Project>>,
    modifications: RwLock<HashMap<Uuid, ModificationRequest>>,
}

impl ForgeOrchestrator {
    pub async fn new(
        client: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn TaskStore>,
        data_dir: &Path,
    ) -> Result<Arc<Self>, String> {
        let projects_root = data_dir.join("projects");
        tokio::fs::create_dir_all(&projects_root)
            .await
            .map_err(|e| format!("Failed to create projects directory: {}", e))?;
        let persistence = ContextPersistence::new(data_dir.join("conversations")).await?;
        Ok(Arc::new(Self {
            client,
            tools,
            store,
            persistence,
            projects_root,
            contexts: RwLock::new(HashMap::new()),
            projects: RwLock::new(HashMap::new()),
            modifications: RwLock::new(HashMap::new()),
        }))
    }

    /// Analyse free-form input: directory context, intent, open questions.
    pub async fn process_input(&self, input: &str, user_id: &str) -> ProcessingResult {
        self.ensure_context(user_id).await;
        let result = self.evaluate(input);
        tracing::info!(
            user_id,
            domain = %result.intent.domain,
            confidence = result.confidence,
            questions = result.questions.len(),
            "processed forge input"
        );
        self.with_context(user_id, |ctx| {
            ctx.history.push(ChatTurn::user(input));
            ctx.pending_questions = result.questions.clone();
        })
        .await;
        result
    }

    /// Fold question answers into the previous input and re-analyse.
    pub async fn process_answers(
        &self,
        answers: &Map<String, Value>,
        user_id: &str,
    ) -> ProcessingResult {
        self.ensure_context(user_id).await;
        let base = self
            .with_context(user_id, |ctx| {
                ctx.history
                    .push(ChatTurn::assistant("Processing your answers..."));
                ctx.history
                    .iter()
                    .rev()
                    .find(|turn| turn.role == "user")
                    .map(|turn| turn.content.clone())
            })
            .await;
        let input = build_input_from_answers(base.as_deref(), answers);
        tracing::debug!(user_id, input = %input, "rebuilt input from answers");

        let result = self.evaluate(&input);
        self.with_context(user_id, |ctx| {
            ctx.pending_questions = result.questions.clone();
        })
        .await;
        result
    }

    /// Build a project from a confirmed intent.
    ///
    /// Returns `Ok` even when the build ends in [`ProjectStatus::Error`];
    /// the status and error list carry the outcome. `Err` is reserved for
    /// failures before the build starts.
    pub async fn create_project(&self, intent: Intent, user_id: &str) -> Result<Project, String> {
        self.ensure_context(user_id).await;
        let id = Uuid::new_v4();
        let stack = intent
            .technology
            .clone()
            .unwrap_or_else(|| intent.domain.clone());
        let dir = self.projects_root.join(id.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| format!("Failed to create project directory: {}", e))?;

        let mut project = Project {
            id,
            name: format!("{}-project", stack),
            project_type: intent.domain.clone(),
            working_directory: dir.display().to_string(),
            status: ProjectStatus::Creating,
            files: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        };
        self.projects.write().await.insert(id, project.clone());
        self.log(
            id,
            "project_created",
            json!({"name": project.name, "type": project.project_type, "user_id": user_id}),
        )
        .await;
        tracing::info!(project = %id, name = %project.name, "creating project");

        let prompt = build_prompt(&intent);
        let mut todos = todo::plan_todos(&prompt);
        project.status = ProjectStatus::Building;
        self.projects.write().await.insert(id, project.clone());
        self.log(id, "project_building", json!({"prompt": prompt, "todos": todos.len()}))
            .await;

        let outcome =
            todo::run_todos(&mut todos, self.client.as_ref(), &self.tools, &dir).await;
        project.files = outcome.files;
        project.warnings = outcome.warnings;
        if outcome.errors.is_empty() {
            project.status = ProjectStatus::Ready;
            project.completed_at = Some(Utc::now());
        } else {
            project.status = ProjectStatus::Error;
            project.errors = outcome.errors;
        }
        self.projects.write().await.insert(id, project.clone());
        let event_type = if project.status == ProjectStatus::Ready {
            "project_ready"
        } else {
            "project_error"
        };
        self.log(
            id,
            event_type,
            json!({
                "files": project.files,
                "errors": project.errors,
                "warnings": project.warnings,
                "todos": todo_summaries(&todos),
            }),
        )
        .await;
        tracing::info!(project = %id, status = project.status.as_str(), "project build finished");

        if project.status == ProjectStatus::Ready {
            self.with_context(user_id, |ctx| {
                ctx.current_project = Some(id);
            })
            .await;
        }
        Ok(project)
    }

    /// Route a free-form message against the user's current project.
    pub async fn interactive_message(&self, message: &str, user_id: &str) -> InteractiveReply {
        self.ensure_context(user_id).await;
        let project = {
            let contexts = self.contexts.read().await;
            contexts.get(user_id).and_then(|c| c.current_project)
        };
        let project = match project {
            Some(id) => self.projects.read().await.get(&id).cloned(),
            None => None,
        };

        let reply = match project {
            None => {
                let processing = self.process_input(message, user_id).await;
                InteractiveReply {
                    success: true,
                    response: "No project is in progress yet, so I treated this as a new \
                               project request. Answer the open questions to continue."
                        .to_string(),
                    modification: None,
                    processing: Some(processing),
                    error: None,
                }
            }
            Some(project) => {
                self.with_context(user_id, |ctx| ctx.history.push(ChatTurn::user(message)))
                    .await;
                let lower = message.to_lowercase();
                if STATUS_HINTS.iter().any(|k| lower.contains(k)) {
                    InteractiveReply::ok(status_line(&project))
                } else if let Some(kind) = modification_kind(&lower) {
                    let modification = ModificationRequest::new(project.id, kind, message);
                    self.modifications
                        .write()
                        .await
                        .insert(modification.id, modification.clone());
                    self.log(
                        project.id,
                        "modification_requested",
                        json!({"modification": modification}),
                    )
                    .await;
                    InteractiveReply {
                        success: true,
                        response: format!(
                            "Got it, tracking a {} request for {}.",
                            kind.label(),
                            project.name
                        ),
                        modification: Some(modification),
                        processing: None,
                        error: None,
                    }
                } else {
                    match self.answer_question(&project, message).await {
                        Ok(answer) => InteractiveReply::ok(answer),
                        Err(err) => InteractiveReply {
                            success: false,
                            response: "Sorry, I could not answer that right now.".to_string(),
                            modification: None,
                            processing: None,
                            error: Some(err),
                        },
                    }
                }
            }
        };
        self.with_context(user_id, |ctx| {
            ctx.history.push(ChatTurn::assistant(reply.response.clone()));
        })
        .await;
        reply
    }

    pub async fn get_project(&self, id: Uuid) -> Option<Project> {
        self.projects.read().await.get(&id).cloned()
    }

    /// All projects, newest first.
    pub async fn list_projects(&self) -> Vec<Project> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    pub async fn get_modification(&self, id: Uuid) -> Option<ModificationRequest> {
        self.modifications.read().await.get(&id).cloned()
    }

    /// Conversation for a user, falling back to the persisted snapshot.
    pub async fn get_conversation(&self, user_id: &str) -> Option<ConversationContext> {
        if let Some(ctx) = self.contexts.read().await.get(user_id).cloned() {
            return Some(ctx);
        }
        match self.persistence.load(user_id).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    fn evaluate(&self, input: &str) -> ProcessingResult {
        let context = intent::analyze_directory(&self.projects_root);
        let intent = intent::extract_intent(input);
        let questions = intent::generate_questions(&intent);
        let confidence = intent::confidence(&intent, questions.len());
        ProcessingResult {
            context,
            intent,
            questions,
            confidence,
        }
    }

    async fn answer_question(&self, project: &Project, message: &str) -> Result<String, String> {
        let messages = [
            ChatMessage::system(format!(
                "You are assisting with a generated software project named {} \
                 (status: {}). Answer the user's question briefly.",
                project.name,
                project.status.as_str()
            )),
            ChatMessage::user(message),
        ];
        let options = ChatOptions {
            model: Some("openai".to_string()),
            temperature: Some(0.7),
            max_tokens: Some(300),
            ..Default::default()
        };
        self.client
            .chat(&messages, options)
            .await
            .map(|r| r.content)
            .map_err(|e| e.to_string())
    }

    /// Load the context into memory if a persisted snapshot exists.
    async fn ensure_context(&self, user_id: &str) {
        {
            let contexts = self.contexts.read().await;
            if contexts.contains_key(user_id) {
                return;
            }
        }
        let restored = match self.persistence.load(user_id).await {
            Ok(Some(value)) => serde_json::from_value::<ConversationContext>(value).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(user_id, error = %err, "failed to restore conversation context");
                None
            }
        };
        let mut contexts = self.contexts.write().await;
        contexts
            .entry(user_id.to_string())
            .or_insert_with(|| restored.unwrap_or_else(|| ConversationContext::new(user_id)));
    }

    /// Mutate the context under the write lock, then snapshot it to disk.
    async fn with_context<T>(
        &self,
        user_id: &str,
        apply: impl FnOnce(&mut ConversationContext) -> T,
    ) -> T {
        let (out, snapshot) = {
            let mut contexts = self.contexts.write().await;
            let ctx = contexts
                .entry(user_id.to_string())
                .or_insert_with(|| ConversationContext::new(user_id));
            let out = apply(ctx);
            (out, ctx.clone())
        };
        match serde_json::to_value(&snapshot) {
            Ok(value) => {
                if let Err(err) = self.persistence.save(&snapshot.user_id, &value).await {
                    tracing::warn!(
                        user_id = %snapshot.user_id,
                        error = %err,
                        "failed to persist conversation context"
                    );
                }
            }
            Err(err) => tracing::warn!(error = %err, "conversation context not serialisable"),
        }
        out
    }

    async fn log(&self, project_id: Uuid, event_type: &str, data: Value) {
        let event = TaskEvent::new(project_id, event_type, data);
        if let Err(err) = self.store.log_event(&event).await {
            tracing::warn!(project = %project_id, error = %err, "failed to log project event");
        }
    }
}

const STATUS_HINTS: &[&str] = &[
    "status",
    "progress",
    "stuck",
    "taking long",
    "finished",
    "done yet",
];

fn modification_kind(message: &str) -> Option<ModificationType> {
    const ADD: &[&str] = &["add", "implement"];
    const BUG: &[&str] = &["error", "bug", "broken", "not working", "doesn't work"];
    const MODIFY: &[&str] = &["change", "modify", "update", "alter"];
    const REMOVE: &[&str] = &["remove", "delete"];

    if ADD.iter().any(|k| message.contains(k)) {
        Some(ModificationType::AddFeature)
    } else if BUG.iter().any(|k| message.contains(k)) {
        Some(ModificationType::FixBug)
    } else if MODIFY.iter().any(|k| message.contains(k)) {
        Some(ModificationType::ModifyExisting)
    } else if REMOVE.iter().any(|k| message.contains(k)) {
        Some(ModificationType::RemoveFeature)
    } else {
        None
    }
}

fn status_line(project: &Project) -> String {
    match project.status {
        ProjectStatus::Creating => format!("Still setting up {}.", project.name),
        ProjectStatus::Building => format!("Building {} right now.", project.name),
        ProjectStatus::Ready => format!(
            "{} is ready to use. {} file(s) were generated.",
            project.name,
            project.files.len()
        ),
        ProjectStatus::Error => format!(
            "{} hit errors during the build: {}",
            project.name,
            project.errors.join("; ")
        ),
    }
}

/// Merge answers into the last user input. Null, empty-string, and
/// empty-array answers are dropped.
fn build_input_from_answers(base: Option<&str>, answers: &Map<String, Value>) -> String {
    let parts: Vec<String> = answers
        .iter()
        .filter_map(|(key, value)| render_answer(value).map(|v| format!("{}: {}", key, v)))
        .collect();
    match base {
        Some(base) if parts.is_empty() => base.to_string(),
        Some(base) => format!("{} with additional requirements: {}", base, parts.join(", ")),
        None if parts.is_empty() => "Create a project with a standard configuration".to_string(),
        None => format!(
            "Create a project with the following requirements: {}",
            parts.join(", ")
        ),
    }
}

fn render_answer(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().filter_map(render_answer).collect();
            if rendered.is_empty() {
                None
            } else {
                Some(rendered.join(", "))
            }
        }
        other => Some(other.to_string()),
    }
}

fn build_prompt(intent: &Intent) -> String {
    let stack = intent.technology.as_deref().unwrap_or(&intent.domain);
    let mut prompt = format!("Create a {} project with {}", intent.domain, stack);
    if !intent.features.is_empty() {
        prompt.push_str(&format!(" including {}", intent.features.join(", ")));
    }
    prompt
}

fn todo_summaries(todos: &[TodoItem]) -> Value {
    Value::Array(
        todos
            .iter()
            .map(|t| json!({"id": t.id, "description": t.description, "status": t.status}))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use crate::llm::{ChatResponse, ImageOptions, LlmError, TextOptions};
    use crate::task::InMemoryTaskStore;

    struct StubClient;

    #[async_trait]
    impl LlmClient for StubClient {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatResponse {
                content: format!("echo: {}", last),
                finish_reason: None,
                model: None,
                usage: None,
            })
        }

        async fn generate_text(&self, _: &str, _: &TextOptions) -> Result<String, LlmError> {
            Ok("stub text".to_string())
        }

        async fn generate_image(&self, _: &str, _: &ImageOptions) -> Result<Bytes, LlmError> {
            Ok(Bytes::from_static(b"img"))
        }

        async fn generate_audio(&self, _: &str, _: &str) -> Result<Bytes, LlmError> {
            Ok(Bytes::from_static(b"aud"))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl LlmClient for FailingClient {
        async fn chat(
            &self,
            _: &[ChatMessage],
            _: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            Err(LlmError::server_error(500, "model offline".to_string()))
        }

        async fn generate_text(&self, _: &str, _: &TextOptions) -> Result<String, LlmError> {
            Err(LlmError::server_error(500, "model offline".to_string()))
        }

        async fn generate_image(&self, _: &str, _: &ImageOptions) -> Result<Bytes, LlmError> {
            Err(LlmError::server_error(500, "model offline".to_string()))
        }

        async fn generate_audio(&self, _: &str, _: &str) -> Result<Bytes, LlmError> {
            Err(LlmError::server_error(500, "model offline".to_string()))
        }
    }

    async fn forge(dir: &Path) -> Arc<ForgeOrchestrator> {
        ForgeOrchestrator::new(
            Arc::new(StubClient),
            Arc::new(ToolRegistry::new()),
            Arc::new(InMemoryTaskStore::new()),
            dir,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn process_input_records_history_and_questions() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(dir.path()).await;

        let result = forge.process_input("do something nice please", "u1").await;
        assert_eq!(result.intent.domain, "unknown");
        assert_eq!(result.questions.len(), 4);
        assert!((result.confidence - 0.3).abs() < 1e-9);

        let ctx = forge.get_conversation("u1").await.unwrap();
        assert_eq!(ctx.history.len(), 1);
        assert_eq!(ctx.history[0].role, "user");
        assert_eq!(ctx.pending_questions.len(), 4);
    }

    #[tokio::test]
    async fn process_answers_folds_into_previous_input() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(dir.path()).await;
        forge.process_input("build a website", "u1").await;

        let mut answers = Map::new();
        answers.insert("technology".to_string(), json!("react"));
        answers.insert("language".to_string(), json!("typescript"));
        let result = forge.process_answers(&answers, "u1").await;

        assert_eq!(result.intent.domain, "frontend");
        assert_eq!(result.intent.technology.as_deref(), Some("react"));
        assert_eq!(result.intent.language.as_deref(), Some("typescript"));

        let ctx = forge.get_conversation("u1").await.unwrap();
        assert!(ctx
            .history
            .iter()
            .any(|t| t.role == "assistant" && t.content == "Processing your answers..."));
    }

    #[tokio::test]
    async fn create_project_builds_a_ready_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(dir.path()).await;
        forge.process_input("build a react app", "u1").await;

        let intent = intent::extract_intent("build a react app");
        let project = forge.create_project(intent, "u1").await.unwrap();

        assert_eq!(project.name, "react-project");
        assert_eq!(project.status, ProjectStatus::Ready);
        assert!(project.files.contains(&"package.json".to_string()));
        assert!(project.errors.is_empty());
        assert!(project.completed_at.is_some());
        assert!(PathBuf::from(&project.working_directory)
            .join("package.json")
            .exists());

        let ctx = forge.get_conversation("u1").await.unwrap();
        assert_eq!(ctx.current_project, Some(project.id));

        let listed = forge.list_projects().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, project.id);
    }

    #[tokio::test]
    async fn failed_build_leaves_project_in_error_without_activating_it() {
        let dir = tempfile::tempdir().unwrap();
        let forge = ForgeOrchestrator::new(
            Arc::new(FailingClient),
            Arc::new(ToolRegistry::new()),
            Arc::new(InMemoryTaskStore::new()),
            dir.path(),
        )
        .await
        .unwrap();

        // script domain plans agent-only todos, which the client fails
        let intent = intent::extract_intent("a little automation helper");
        let project = forge.create_project(intent, "u1").await.unwrap();

        assert_eq!(project.status, ProjectStatus::Error);
        assert!(!project.errors.is_empty());
        assert!(project.completed_at.is_none());
        let ctx = forge.get_conversation("u1").await.unwrap();
        assert_eq!(ctx.current_project, None);
    }

    #[tokio::test]
    async fn build_events_land_in_the_task_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryTaskStore::new());
        let forge = ForgeOrchestrator::new(
            Arc::new(StubClient),
            Arc::new(ToolRegistry::new()),
            store.clone(),
            dir.path(),
        )
        .await
        .unwrap();

        let intent = intent::extract_intent("build a react app");
        let project = forge.create_project(intent, "u1").await.unwrap();

        let events = store.get_events(project.id).await.unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["project_created", "project_building", "project_ready"]);
    }

    #[tokio::test]
    async fn interactive_message_routes_by_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let forge = forge(dir.path()).await;

        // no active project: treated as new-project input
        let reply = forge.interactive_message("make me a website", "u1").await;
        assert!(reply.success);
        assert!(reply.processing.is_some());
        assert!(reply.modification.is_none());

        let intent = intent::extract_intent("build a react app");
        forge.create_project(intent, "u1").await.unwrap();

        let reply = forge.interactive_message("what is the status?", "u1").await;
        assert!(reply.response.contains("ready to use"));

        let reply = forge
            .interactive_message("please add a dark mode toggle", "u1")
            .await;
        let modification = reply.modification.unwrap();
        assert_eq!(modification.modification_type, ModificationType::AddFeature);
        assert_eq!(modification.status, ModificationStatus::Pending);
        assert_eq!(
            forge.get_modification(modification.id).await.unwrap().id,
            modification.id
        );

        let reply = forge.interactive_message("how do I run it?", "u1").await;
        assert!(reply.success);
        assert_eq!(reply.response, "echo: how do I run it?");
    }

    #[tokio::test]
    async fn conversation_context_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let forge = forge(dir.path()).await;
            forge.process_input("build a react app", "u1").await;
        }
        let forge = forge(dir.path()).await;
        forge.process_input("make it dark themed", "u1").await;

        let ctx = forge.get_conversation("u1").await.unwrap();
        assert_eq!(ctx.history.len(), 2);
    }
}
