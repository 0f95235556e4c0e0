//! File reading tool, confined to a root directory

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{Result, ToolServerError};
use crate::tool::{Tool, ToolDefinition};

/// Reads UTF-8 files under `root`, up to `max_bytes`
pub struct ReadFileTool {
    root: PathBuf,
    max_bytes: u64,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Resolve `requested` inside the root; symlinks and `..` may not escape it
    async fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| ToolServerError::Execution(format!("root directory unavailable: {}", e)))?;

        let relative = Path::new(requested.trim_start_matches('/'));
        let path = tokio::fs::canonicalize(root.join(relative))
            .await
            .map_err(|e| ToolServerError::Execution(format!("cannot open '{}': {}", requested, e)))?;

        if !path.starts_with(&root) {
            return Err(ToolServerError::Execution(format!(
                "access denied: '{}' is outside the served directory",
                requested
            )));
        }
        Ok(path)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read a UTF-8 text file from the server's working directory".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path relative to the served directory"
                    }
                },
                "required": ["path"]
            }),
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        let requested = arguments
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if requested.trim().is_empty() {
            return Err(ToolServerError::InvalidParams("path must not be empty".into()));
        }

        let path = self.resolve(requested).await?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ToolServerError::Execution(format!("cannot open '{}': {}", requested, e)))?;

        if !metadata.is_file() {
            return Err(ToolServerError::Execution(format!("'{}' is not a file", requested)));
        }
        if metadata.len() > self.max_bytes {
            return Err(ToolServerError::Execution(format!(
                "'{}' is {} bytes; the limit is {}",
                requested,
                metadata.len(),
                self.max_bytes
            )));
        }

        let bytes = tokio::fs::read(&path).await?;
        String::from_utf8(bytes)
            .map_err(|_| ToolServerError::Execution(format!("'{}' is not valid UTF-8", requested)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh directory under the system temp dir
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mcp-tool-server-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("docs")).unwrap();
        std::fs::write(dir.join("docs/notes.txt"), "hello from notes").unwrap();
        std::fs::write(dir.join("big.txt"), "x".repeat(64)).unwrap();
        std::fs::write(dir.join("binary.bin"), [0xff, 0xfe, 0x00]).unwrap();
        dir
    }

    fn path_args(path: &str) -> Map<String, Value> {
        json!({"path": path}).as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_reads_inside_root() {
        let root = scratch("read");
        let tool = ReadFileTool::new(&root, 32);

        assert_eq!(tool.execute(&path_args("docs/notes.txt")).await.unwrap(), "hello from notes");
        assert_eq!(tool.execute(&path_args("/docs/notes.txt")).await.unwrap(), "hello from notes");
        std::fs::remove_dir_all(root).ok();
    }

    #[tokio::test]
    async fn test_rejections() {
        let root = scratch("reject");
        let tool = ReadFileTool::new(root.join("docs"), 32);

        let escape = tool.execute(&path_args("../big.txt")).await.unwrap_err();
        assert!(escape.to_string().contains("outside the served directory"));

        let tool = ReadFileTool::new(&root, 32);
        assert!(tool.execute(&path_args("big.txt")).await.unwrap_err().to_string().contains("limit"));
        assert!(tool.execute(&path_args("binary.bin")).await.unwrap_err().to_string().contains("UTF-8"));
        assert!(tool.execute(&path_args("docs")).await.unwrap_err().to_string().contains("not a file"));
        assert!(tool.execute(&path_args("missing.txt")).await.is_err());
        std::fs::remove_dir_all(root).ok();
    }
}
