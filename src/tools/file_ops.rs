//! File tools: read, write, delete.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{escapes_workspace, resolve_path, Tool};

fn path_arg(args: &Value) -> anyhow::Result<&str> {
    args["path"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("Missing 'path' argument"))
}

/// Read a UTF-8 text file, optionally restricted to a line range.
pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Relative paths resolve inside the workspace. Optionally restrict to a line range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to read, relative to the workspace" },
                "from_line": { "type": "integer", "description": "First line to include, 1-based" },
                "to_line": { "type": "integer", "description": "Last line to include, inclusive" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let path = resolve_path(path_arg(&args)?, workspace);
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        let bytes = tokio::fs::read(&path).await?;
        let text = String::from_utf8(bytes)
            .map_err(|_| anyhow::anyhow!("{} is not valid UTF-8 text", path.display()))?;

        let from = args["from_line"].as_u64();
        let to = args["to_line"].as_u64();
        if from.is_none() && to.is_none() {
            return Ok(text);
        }

        let lines: Vec<&str> = text.lines().collect();
        let start = from.unwrap_or(1).max(1) as usize;
        let end = to
            .map(|t| t as usize)
            .unwrap_or(lines.len())
            .min(lines.len());
        if start > end {
            anyhow::bail!("Empty line range {}..{} for {}", start, end, path.display());
        }
        Ok(lines[start - 1..end].join("\n"))
    }
}

/// Write a file, creating parent directories as needed.
pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Overwrites existing files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Destination path, relative to the workspace" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let path = resolve_path(path_arg(&args)?, workspace);
        let content = args["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'content' argument"))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        let mut report = format!("Wrote {} bytes to {}", content.len(), path.display());
        if escapes_workspace(&path, workspace) {
            report.push_str("\nNote: path is outside the workspace");
        }
        Ok(report)
    }
}

/// Delete a single file.
pub struct DeleteFile;

#[async_trait]
impl Tool for DeleteFile {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file from the workspace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to delete, relative to the workspace" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let path = resolve_path(path_arg(&args)?, workspace);
        if !path.exists() {
            anyhow::bail!("File not found: {}", path.display());
        }
        tokio::fs::remove_file(&path).await?;
        Ok(format!("Deleted {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_creates_parents_and_read_returns_content() {
        let dir = tempfile::tempdir().unwrap();
        let report = WriteFile
            .execute(
                json!({"path": "nested/deep/note.txt", "content": "hello tools"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(report.starts_with("Wrote 11 bytes"));
        assert!(!report.contains("outside the workspace"));

        let text = ReadFile
            .execute(json!({"path": "nested/deep/note.txt"}), dir.path())
            .await
            .unwrap();
        assert_eq!(text, "hello tools");
    }

    #[tokio::test]
    async fn read_honours_line_window() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("poem.txt"), "one\ntwo\nthree\nfour").unwrap();

        let middle = ReadFile
            .execute(
                json!({"path": "poem.txt", "from_line": 2, "to_line": 3}),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(middle, "two\nthree");

        let tail = ReadFile
            .execute(json!({"path": "poem.txt", "from_line": 4}), dir.path())
            .await
            .unwrap();
        assert_eq!(tail, "four");

        let err = ReadFile
            .execute(json!({"path": "poem.txt", "from_line": 9}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Empty line range"));
    }

    #[tokio::test]
    async fn read_rejects_missing_and_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFile
            .execute(json!({"path": "nope.txt"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));

        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let err = ReadFile
            .execute(json!({"path": "blob.bin"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }

    #[tokio::test]
    async fn delete_removes_file_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gone.txt"), "x").unwrap();

        let report = DeleteFile
            .execute(json!({"path": "gone.txt"}), dir.path())
            .await
            .unwrap();
        assert!(report.starts_with("Deleted"));
        assert!(!dir.path().join("gone.txt").exists());

        let err = DeleteFile
            .execute(json!({"path": "gone.txt"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[tokio::test]
    async fn write_outside_workspace_is_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("escape.txt");
        let report = WriteFile
            .execute(
                json!({"path": target.to_str().unwrap(), "content": "x"}),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(report.contains("outside the workspace"));
    }
}
