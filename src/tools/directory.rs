//! Directory listing.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::{resolve_path, Tool};

/// List files and directories under a path.
pub struct ListDirectory;

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories recursively. Defaults to the workspace root. Directories carry a trailing slash."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list, relative to the workspace (default: workspace root)" },
                "max_depth": { "type": "integer", "description": "Recursion depth (default: 3)" }
            }
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<String> {
        let root = resolve_path(args["path"].as_str().unwrap_or("."), workspace);
        let max_depth = args["max_depth"].as_u64().unwrap_or(3) as usize;

        if !root.is_dir() {
            anyhow::bail!("Not a directory: {}", root.display());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(max_depth.max(1))
            .sort_by_file_name()
        {
            let entry = entry?;
            let rel = entry.path().strip_prefix(&root).unwrap_or(entry.path());
            let mut line = rel.display().to_string();
            if entry.file_type().is_dir() {
                line.push('/');
            }
            entries.push(line);
        }

        if entries.is_empty() {
            return Ok("Directory is empty".to_string());
        }
        let count = entries.len();
        Ok(format!("{}\n({} entries)", entries.join("\n"), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(dir: &Path) {
        std::fs::create_dir_all(dir.join("src/nested")).unwrap();
        std::fs::write(dir.join("README.md"), "hi").unwrap();
        std::fs::write(dir.join("src/lib.rs"), "pub fn x() {}").unwrap();
        std::fs::write(dir.join("src/nested/deep.txt"), "deep").unwrap();
    }

    #[tokio::test]
    async fn listing_is_relative_with_dir_markers() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let listing = ListDirectory
            .execute(json!({}), dir.path())
            .await
            .unwrap();
        assert!(listing.contains("README.md"));
        assert!(listing.contains("src/"));
        assert!(listing.contains("src/nested/deep.txt"));
        assert!(listing.ends_with("(5 entries)"));
    }

    #[tokio::test]
    async fn depth_limit_hides_deeper_entries() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let listing = ListDirectory
            .execute(json!({"max_depth": 1}), dir.path())
            .await
            .unwrap();
        assert!(listing.contains("src/"));
        assert!(!listing.contains("lib.rs"));
    }

    #[tokio::test]
    async fn empty_and_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let listing = ListDirectory
            .execute(json!({}), dir.path())
            .await
            .unwrap();
        assert_eq!(listing, "Directory is empty");

        let err = ListDirectory
            .execute(json!({"path": "missing"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not a directory"));
    }
}
