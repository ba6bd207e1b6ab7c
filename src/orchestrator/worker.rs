//! Task execution.
//!
//! The worker turns a classified task into a concrete result: conversation and
//! text tasks go through the chat endpoint (enriched with contextual
//! knowledge), image and audio tasks come back as base64 data URLs, composite
//! tasks report a delegation plan, and generic tasks can run a registered tool
//! inside the workspace.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::knowledge::KnowledgeManager;
use crate::llm::{ChatMessage, ChatOptions, ImageOptions, LlmClient};
use crate::task::{Task, TaskResult, TaskType};
use crate::tools::ToolRegistry;

const DEFAULT_TEXT_MODEL: &str = "openai";
const DEFAULT_IMAGE_MODEL: &str = "flux";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const DEFAULT_VOICE: &str = "alloy";
const AUDIO_MODEL: &str = "openai-audio";

/// Prompts that look like media work when a generic task has no tool attached.
const IMAGE_HINTS: &[&str] = &["image", "picture", "photo", "generate", "create", "draw"];
const TEXT_HINTS: &[&str] = &["write", "story", "essay", "text", "content"];

/// Executes individual tasks against the generation client and tool registry.
pub struct Worker {
    client: Arc<dyn LlmClient>,
    knowledge: Arc<KnowledgeManager>,
    tools: Arc<ToolRegistry>,
    workspace: PathBuf,
    tool_timeout: Duration,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight counter when execution ends, panic included.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Worker {
    pub fn new(
        client: Arc<dyn LlmClient>,
        knowledge: Arc<KnowledgeManager>,
        tools: Arc<ToolRegistry>,
        workspace: PathBuf,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            client,
            knowledge,
            tools,
            workspace,
            tool_timeout,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Whether the worker has no task in flight. Used by the orchestrator to
    /// decide when composite children can be delegated immediately.
    pub fn is_available(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0
    }

    /// Run a task to completion. Never returns an error: every failure mode is
    /// reported through `TaskResult` so the orchestrator can record it.
    pub async fn execute(&self, task: &Task) -> TaskResult {
        let _guard = InFlight::enter(&self.in_flight);
        tracing::debug!(task_id = %task.id, task_type = ?task.task_type, "worker executing task");

        match task.task_type {
            TaskType::Conversation => self.handle_conversation(task).await,
            TaskType::TextGeneration => self.handle_text(task).await,
            TaskType::ImageGeneration => self.handle_image(task).await,
            TaskType::AudioGeneration => self.handle_audio(task).await,
            TaskType::CompositeTask => self.handle_composite(task),
            TaskType::GenericTask => self.handle_generic(task).await,
        }
    }

    async fn handle_conversation(&self, task: &Task) -> TaskResult {
        let knowledge = self.knowledge.contextual(&task.prompt, 2).await;
        let enhanced = format!("{}{}", task.prompt, knowledge);

        let options = ChatOptions {
            model: Some(DEFAULT_TEXT_MODEL.to_string()),
            temperature: Some(0.7),
            seed: None,
            max_tokens: Some(500),
        };

        match self.client.chat(&[ChatMessage::user(enhanced)], options).await {
            Ok(response) => TaskResult::ok(json!(response.content)).with_metadata(json!({
                "type": "conversation",
                "model": DEFAULT_TEXT_MODEL,
                "temperature": 0.7,
                "knowledge_used": !knowledge.is_empty(),
            })),
            Err(err) => TaskResult::fail(err.to_string())
                .with_metadata(json!({ "type": "conversation" })),
        }
    }

    async fn handle_text(&self, task: &Task) -> TaskResult {
        let params = classification_params(task);
        let knowledge = self.knowledge.contextual(&task.prompt, 3).await;
        let enhanced = format!("{}{}", task.prompt, knowledge);

        let model = params
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_TEXT_MODEL)
            .to_string();
        let temperature = params
            .get("temperature")
            .and_then(Value::as_f64)
            .unwrap_or(0.7);
        let max_tokens = params
            .get("max_words")
            .and_then(Value::as_u64)
            .map(|words| words * 10)
            .unwrap_or(500);

        let options = ChatOptions {
            model: Some(model.clone()),
            temperature: Some(temperature),
            seed: None,
            max_tokens: Some(max_tokens),
        };

        match self.client.chat(&[ChatMessage::user(enhanced)], options).await {
            Ok(response) => TaskResult::ok(json!(response.content)).with_metadata(json!({
                "type": "text_generation",
                "model": model,
                "temperature": temperature,
                "max_tokens": max_tokens,
                "knowledge_used": !knowledge.is_empty(),
            })),
            Err(err) => TaskResult::fail(err.to_string())
                .with_metadata(json!({ "type": "text_generation" })),
        }
    }

    async fn handle_image(&self, task: &Task) -> TaskResult {
        let params = classification_params(task);

        let prompt = params
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or(&task.prompt)
            .to_string();
        let size = params
            .get("size")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_IMAGE_SIZE)
            .to_string();
        let model = params
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_IMAGE_MODEL)
            .to_string();
        let transparent = params
            .get("transparent")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let (width, height) = parse_size(&size);
        let options = ImageOptions {
            width: Some(width),
            height: Some(height),
            model: Some(model.clone()),
            ..ImageOptions::default()
        };

        match self.client.generate_image(&prompt, &options).await {
            Ok(bytes) => {
                let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes));
                TaskResult::ok(json!(data_url)).with_metadata(json!({
                    "type": "image_generation",
                    "size": size,
                    "model": model,
                    "transparent": transparent,
                }))
            }
            Err(err) => TaskResult::fail(err.to_string())
                .with_metadata(json!({ "type": "image_generation" })),
        }
    }

    async fn handle_audio(&self, task: &Task) -> TaskResult {
        let params = classification_params(task);
        let action = params
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        if action != "text_to_speech" {
            return TaskResult::fail(format!("Unsupported audio action: {}", action))
                .with_metadata(json!({ "type": "audio" }));
        }

        let voice = params
            .get("voice")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_VOICE)
            .to_string();

        match self.client.generate_audio(&task.prompt, &voice).await {
            Ok(bytes) => {
                let data_url = format!("data:audio/mpeg;base64,{}", BASE64.encode(&bytes));
                TaskResult::ok(json!(data_url)).with_metadata(json!({
                    "type": "audio_generation",
                    "action": "text_to_speech",
                    "voice": voice,
                    "model": AUDIO_MODEL,
                }))
            }
            Err(err) => {
                TaskResult::fail(err.to_string()).with_metadata(json!({ "type": "audio" }))
            }
        }
    }

    /// Composite tasks are not executed here; the orchestrator delegates their
    /// subtasks. The worker only acknowledges the plan.
    fn handle_composite(&self, task: &Task) -> TaskResult {
        TaskResult::ok(json!({
            "message": "Composite task plan created, execution will be delegated",
            "task_id": task.id,
            "type": "composite",
        }))
        .with_metadata(json!({
            "type": "composite",
            "subtask_count": task.child_tasks.len(),
        }))
    }

    async fn handle_generic(&self, task: &Task) -> TaskResult {
        let params = classification_params(task);

        // An explicit tool request (from the create call or the classifier)
        // takes precedence over keyword routing.
        let tool = task
            .metadata
            .get("tool")
            .or_else(|| params.get("tool"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(name) = tool {
            let args = task
                .metadata
                .get("args")
                .or_else(|| params.get("args"))
                .cloned()
                .unwrap_or_else(|| json!({}));
            return self.run_tool(&name, args).await;
        }

        let lower = task.prompt.to_lowercase();
        if IMAGE_HINTS.iter().any(|k| lower.contains(k)) {
            self.handle_image(task).await
        } else if TEXT_HINTS.iter().any(|k| lower.contains(k)) {
            self.handle_text(task).await
        } else {
            TaskResult::fail("Unsupported task subtype: generic")
                .with_metadata(json!({ "type": "task", "subtype": "generic" }))
        }
    }

    async fn run_tool(&self, name: &str, args: Value) -> TaskResult {
        tracing::debug!(tool = name, "running tool for generic task");

        match timeout(self.tool_timeout, self.tools.execute(name, args, &self.workspace)).await {
            Ok(Ok(output)) => TaskResult::ok(json!({
                "tool": name,
                "output": output,
            }))
            .with_metadata(json!({ "type": "tool_execution", "tool": name })),
            Ok(Err(err)) => TaskResult::fail(format!("Tool {} failed: {}", name, err))
                .with_metadata(json!({ "type": "tool_execution", "tool": name })),
            Err(_) => TaskResult::fail(format!(
                "Tool {} timed out after {:?}",
                name, self.tool_timeout
            ))
            .with_metadata(json!({ "type": "tool_execution", "tool": name })),
        }
    }
}

/// Parameters recorded by the classifier, or an empty object for tasks that
/// were created without classification metadata.
fn classification_params(task: &Task) -> Value {
    task.metadata
        .get("classification")
        .and_then(|c| c.get("parameters"))
        .cloned()
        .unwrap_or_else(|| json!({}))
}

fn parse_size(size: &str) -> (u32, u32) {
    size.split_once('x')
        .and_then(|(w, h)| Some((w.trim().parse().ok()?, h.trim().parse().ok()?)))
        .unwrap_or((1024, 1024))
}
