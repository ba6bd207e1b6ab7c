//! Workspace-scoped tools for generic tasks and project builds.
//!
//! Every tool receives the workspace directory of the task or project
//! that invoked it. Relative paths in tool arguments resolve against
//! that directory; absolute paths pass through untouched.

pub mod directory;
pub mod file_ops;
pub mod terminal;
pub mod web;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// A tool invocable by name with JSON arguments.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String>;
}

/// Name, description and parameter schema of a registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// The set of tools the runtime exposes.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry with the full tool set.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(file_ops::ReadFile));
        registry.register(Arc::new(file_ops::WriteFile));
        registry.register(Arc::new(file_ops::DeleteFile));
        registry.register(Arc::new(directory::ListDirectory));
        registry.register(Arc::new(terminal::RunCommand));
        registry.register(Arc::new(web::WebSearch));
        registry.register(Arc::new(web::FetchUrl));
        registry
    }

    /// Registry with no tools registered.
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Every registered tool, sorted by name.
    pub fn list_tools(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self
            .tools
            .values()
            .map(|tool| ToolInfo {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Run a tool by name against the given workspace.
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        workspace: &Path,
    ) -> anyhow::Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;
        tracing::debug!(tool = name, "executing tool");
        tool.execute(args, workspace).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve a tool path argument against the workspace.
pub(crate) fn resolve_path(raw: &str, workspace: &Path) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// True when `path` does not sit under `workspace`.
///
/// Compares canonicalized paths where they exist; a not-yet-created file
/// is judged by its parent directory.
pub(crate) fn escapes_workspace(path: &Path, workspace: &Path) -> bool {
    let root = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());
    let resolved = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => match path.parent().and_then(|p| p.canonicalize().ok()) {
            Some(parent) => parent.join(path.file_name().unwrap_or_default()),
            None => path.to_path_buf(),
        },
    };
    !resolved.starts_with(&root)
}

/// Largest index `<= max` that falls on a char boundary of `s`.
pub(crate) fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
