//! Todo planning and execution for project builds.
//!
//! A prompt is categorised into one of four canned plans. Tool steps go
//! through the tool registry inside the project directory; agent steps
//! go through the chat client with a role prompt.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoKind {
    Agent,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One step of a project build.
#[derive(Debug, Clone, Serialize)]
pub struct TodoItem {
    pub id: Uuid,
    pub description: String,
    pub kind: TodoKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    pub dependencies: Vec<Uuid>,
    pub status: TodoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn agent_step(description: &str, agent: &str, dependencies: Vec<Uuid>) -> TodoItem {
    TodoItem {
        id: Uuid::new_v4(),
        description: description.to_string(),
        kind: TodoKind::Agent,
        agent: Some(agent.to_string()),
        tool: None,
        args: None,
        dependencies,
        status: TodoStatus::Pending,
        result: None,
        error: None,
        created_at: Utc::now(),
    }
}

fn tool_step(description: &str, tool: &str, args: Value, dependencies: Vec<Uuid>) -> TodoItem {
    TodoItem {
        id: Uuid::new_v4(),
        description: description.to_string(),
        kind: TodoKind::Tool,
        agent: None,
        tool: Some(tool.to_string()),
        args: Some(args),
        dependencies,
        status: TodoStatus::Pending,
        result: None,
        error: None,
        created_at: Utc::now(),
    }
}

const RESEARCH_HINTS: &[&str] = &["research", "analyze", "investigate"];
const CONTENT_HINTS: &[&str] = &["write", "content", "article"];
const TECH_HINTS: &[&str] = &[
    "react",
    "vue",
    "angular",
    "application",
    "app",
    "dashboard",
    "authentication",
    "api",
    "database",
];

/// Categorise the prompt and return the matching plan.
pub fn plan_todos(prompt: &str) -> Vec<TodoItem> {
    let lower = prompt.to_lowercase();
    if RESEARCH_HINTS.iter().any(|k| lower.contains(k)) {
        research_plan(prompt)
    } else if CONTENT_HINTS.iter().any(|k| lower.contains(k)) {
        content_plan(prompt)
    } else if TECH_HINTS.iter().any(|k| lower.contains(k)) {
        tech_plan()
    } else {
        generic_plan()
    }
}

fn research_plan(prompt: &str) -> Vec<TodoItem> {
    let scope = agent_step("Define the research scope", "research_planner", vec![]);
    let collect = tool_step(
        "Collect sources",
        "web_search",
        json!({"query": prompt, "num_results": 10}),
        vec![scope.id],
    );
    let analyse = agent_step("Organise the findings", "data_analyst", vec![collect.id]);
    let report = agent_step("Write the final report", "report_writer", vec![analyse.id]);
    vec![scope, collect, analyse, report]
}

fn content_plan(prompt: &str) -> Vec<TodoItem> {
    let analyse = agent_step("Break down the content requirements", "content_analyst", vec![]);
    let sources = tool_step(
        "Gather references",
        "web_search",
        json!({"query": prompt, "num_results": 5}),
        vec![analyse.id],
    );
    let outline = agent_step("Outline the content", "content_planner", vec![sources.id]);
    let draft = agent_step("Write the content", "content_writer", vec![outline.id]);
    let edit = agent_step("Review and polish", "content_editor", vec![draft.id]);
    vec![analyse, sources, outline, draft, edit]
}

const PACKAGE_JSON: &str = r#"{
  "name": "flui-project",
  "version": "1.0.0",
  "private": true,
  "scripts": {
    "dev": "echo \"development server\"",
    "build": "echo \"build completed\""
  }
}
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Generated project</title></head>
  <body><h1>Project scaffold</h1></body>
</html>
"#;

fn tech_plan() -> Vec<TodoItem> {
    let setup = tool_step(
        "Scaffold the project manifest",
        "write_file",
        json!({"path": "package.json", "content": PACKAGE_JSON}),
        vec![],
    );
    let implement = tool_step(
        "Create the entry page",
        "write_file",
        json!({"path": "index.html", "content": INDEX_HTML}),
        vec![setup.id],
    );
    let verify = tool_step(
        "Smoke-test the scaffold",
        "run_command",
        json!({"command": "ls package.json index.html"}),
        vec![implement.id],
    );
    vec![setup, implement, verify]
}

fn generic_plan() -> Vec<TodoItem> {
    let analyse = agent_step("Break the task down", "task_analyst", vec![]);
    let execute = agent_step("Carry out the main task", "task_executor", vec![analyse.id]);
    let finish = agent_step("Summarise the outcome", "task_finalizer", vec![execute.id]);
    vec![analyse, execute, finish]
}

/// Pending todos whose dependencies have all completed.
pub fn next_executable(todos: &[TodoItem]) -> Vec<Uuid> {
    todos
        .iter()
        .filter(|todo| {
            todo.status == TodoStatus::Pending
                && todo.dependencies.iter().all(|dep| {
                    todos
                        .iter()
                        .any(|t| t.id == *dep && t.status == TodoStatus::Completed)
                })
        })
        .map(|todo| todo.id)
        .collect()
}

pub fn all_done(todos: &[TodoItem]) -> bool {
    todos
        .iter()
        .all(|t| matches!(t.status, TodoStatus::Completed | TodoStatus::Failed))
}

/// Files written, warnings, and errors collected while running a plan.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub files: Vec<String>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Run the plan round by round until nothing is executable. Todos left
/// pending at that point had a failed dependency and are marked failed.
pub async fn run_todos(
    todos: &mut [TodoItem],
    client: &dyn LlmClient,
    tools: &ToolRegistry,
    workspace: &Path,
) -> BuildOutcome {
    let mut outcome = BuildOutcome::default();
    loop {
        let runnable = next_executable(todos);
        if runnable.is_empty() {
            break;
        }
        for id in runnable {
            let Some(idx) = todos.iter().position(|t| t.id == id) else {
                continue;
            };
            todos[idx].status = TodoStatus::Running;
            let step = todos[idx].clone();
            tracing::debug!(todo = %step.id, description = %step.description, "running todo");
            let result = match step.kind {
                TodoKind::Tool => run_tool_step(&step, tools, workspace).await,
                TodoKind::Agent => run_agent_step(&step, client).await,
            };
            match result {
                Ok(output) => {
                    if step.tool.as_deref() == Some("write_file") {
                        if let Some(path) = step.args.as_ref().and_then(|a| a["path"].as_str()) {
                            outcome.files.push(path.to_string());
                        }
                    }
                    // run_command reports are Ok even for non-zero exits
                    if step.tool.as_deref() == Some("run_command")
                        && !output.starts_with("exit code: 0")
                    {
                        outcome
                            .warnings
                            .push(format!("{}: command exited non-zero", step.description));
                    }
                    todos[idx].status = TodoStatus::Completed;
                    todos[idx].result = Some(output);
                }
                Err(err) => {
                    tracing::warn!(todo = %step.id, error = %err, "todo failed");
                    outcome.errors.push(format!("{}: {}", step.description, err));
                    todos[idx].status = TodoStatus::Failed;
                    todos[idx].error = Some(err);
                }
            }
        }
    }
    for todo in todos
        .iter_mut()
        .filter(|t| t.status == TodoStatus::Pending)
    {
        let note = "skipped: a dependency failed".to_string();
        outcome.errors.push(format!("{}: {}", todo.description, note));
        todo.status = TodoStatus::Failed;
        todo.error = Some(note);
    }
    outcome
}

async fn run_tool_step(
    step: &TodoItem,
    tools: &ToolRegistry,
    workspace: &Path,
) -> Result<String, String> {
    let name = step
        .tool
        .as_deref()
        .ok_or_else(|| "tool step without a tool name".to_string())?;
    let args = step.args.clone().unwrap_or_else(|| json!({}));
    tools
        .execute(name, args, workspace)
        .await
        .map_err(|e| e.to_string())
}

async fn run_agent_step(step: &TodoItem, client: &dyn LlmClient) -> Result<String, String> {
    let role = step
        .agent
        .as_deref()
        .unwrap_or("assistant")
        .replace('_', " ");
    let messages = [
        ChatMessage::system(format!(
            "You are the {} of an automated build. Produce this step's output, concisely.",
            role
        )),
        ChatMessage::user(step.description.clone()),
    ];
    let options = ChatOptions {
        model: Some("openai".to_string()),
        temperature: Some(0.7),
        max_tokens: Some(500),
        ..Default::default()
    };
    client
        .chat(&messages, options)
        .await
        .map(|r| r.content)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use crate::llm::{ChatResponse, ImageOptions, LlmError, TextOptions};

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
                content: format!("done: {}", last),
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
            Err(LlmError::server_error(500, "upstream exploded".to_string()))
        }

        async fn generate_text(&self, _: &str, _: &TextOptions) -> Result<String, LlmError> {
            Err(LlmError::server_error(500, "upstream exploded".to_string()))
        }

        async fn generate_image(&self, _: &str, _: &ImageOptions) -> Result<Bytes, LlmError> {
            Err(LlmError::server_error(500, "upstream exploded".to_string()))
        }

        async fn generate_audio(&self, _: &str, _: &str) -> Result<Bytes, LlmError> {
            Err(LlmError::server_error(500, "upstream exploded".to_string()))
        }
    }

    #[test]
    fn research_prompt_plans_search_chain() {
        let todos = plan_todos("research the rust async ecosystem");
        assert_eq!(todos.len(), 4);
        assert_eq!(todos[1].kind, TodoKind::Tool);
        assert_eq!(todos[1].tool.as_deref(), Some("web_search"));
        assert_eq!(
            todos[1].args.as_ref().unwrap()["query"],
            "research the rust async ecosystem"
        );
        assert_eq!(todos[1].dependencies, vec![todos[0].id]);
        assert_eq!(todos[3].dependencies, vec![todos[2].id]);
    }

    #[test]
    fn category_detection_orders_research_before_tech() {
        assert_eq!(plan_todos("analyze the react market").len(), 4);
        assert_eq!(plan_todos("write an article about cats").len(), 5);
        assert_eq!(plan_todos("build a react dashboard").len(), 3);
        let generic = plan_todos("hello there");
        assert_eq!(generic.len(), 3);
        assert!(generic.iter().all(|t| t.kind == TodoKind::Agent));
    }

    #[test]
    fn only_root_todos_are_initially_executable() {
        let todos = plan_todos("research something");
        let runnable = next_executable(&todos);
        assert_eq!(runnable, vec![todos[0].id]);
        assert!(!all_done(&todos));
    }

    #[tokio::test]
    async fn tech_plan_writes_scaffold_files() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolRegistry::new();
        let mut todos = plan_todos("build a react dashboard");

        let outcome = run_todos(&mut todos, &StubClient, &tools, dir.path()).await;
        assert!(outcome.errors.is_empty());
        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.files, vec!["package.json", "index.html"]);
        assert!(all_done(&todos));
        assert!(todos.iter().all(|t| t.status == TodoStatus::Completed));
        assert!(dir.path().join("package.json").exists());
        assert!(dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn failed_dependency_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolRegistry::new();
        let mut todos = plan_todos("hello there");

        let outcome = run_todos(&mut todos, &FailingClient, &tools, dir.path()).await;
        assert_eq!(outcome.errors.len(), 3);
        assert_eq!(todos[0].status, TodoStatus::Failed);
        assert!(todos[0].error.as_deref().unwrap().contains("upstream exploded"));
        assert!(todos[1..]
            .iter()
            .all(|t| t.error.as_deref() == Some("skipped: a dependency failed")));
        assert!(all_done(&todos));
    }

    #[tokio::test]
    async fn agent_steps_flow_through_the_chat_client() {
        let dir = tempfile::tempdir().unwrap();
        let tools = ToolRegistry::empty();
        let mut todos = plan_todos("hello there");

        run_todos(&mut todos, &StubClient, &tools, dir.path()).await;
        assert_eq!(
            todos[0].result.as_deref(),
            Some("done: Break the task down")
        );
    }
}
