//! Filesystem tools — read, write, list directory.
//!
//! Every path goes through the shared [`Sandbox`] before any I/O. Error
//! observations quote the path exactly as the model supplied it.

use async_trait::async_trait;
use tracing::debug;

use super::base::{optional_param, require_param, Tool, ToolError, ToolKind, ToolParams};
use super::sandbox::Sandbox;
use crate::parser::CONTENT_KEY;

// ─────────────────────────────────────────────
// ReadFileTool
// ─────────────────────────────────────────────

/// Reads and returns the entire content of a file.
pub struct ReadFileTool {
    sandbox: Sandbox,
}

impl ReadFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        ToolKind::ReadFile.name()
    }

    fn description(&self) -> &str {
        "Read the contents of a file relative to the project root. Returns the full text."
    }

    fn usage(&self) -> &str {
        r#"<tool_call:read_file path="path/to/file" />"#
    }

    async fn execute(&self, params: &ToolParams) -> Result<String, ToolError> {
        let path = require_param(params, "path")?;
        let resolved = self.sandbox.resolve(path)?;

        debug!(path = %resolved.display(), "reading file");
        tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::io("reading", path, e))
    }
}

// ─────────────────────────────────────────────
// WriteFileTool
// ─────────────────────────────────────────────

/// Creates or overwrites a file with the given content.
pub struct WriteFileTool {
    sandbox: Sandbox,
}

impl WriteFileTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        ToolKind::WriteFile.name()
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it doesn't exist or overwriting if it does. \
         Parent directories are created automatically."
    }

    fn usage(&self) -> &str {
        "<tool_call:write_file path=\"path/to/file\">\nfile content here\n</tool_call:write_file>"
    }

    fn requires_confirmation(&self) -> bool {
        ToolKind::WriteFile.is_sensitive()
    }

    async fn execute(&self, params: &ToolParams) -> Result<String, ToolError> {
        let path = require_param(params, "path")?;
        let content = require_param(params, CONTENT_KEY)?;
        let resolved = self.sandbox.resolve(path)?;

        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io("writing", path, e))?;
        }

        debug!(path = %resolved.display(), bytes = content.len(), "writing file");
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::io("writing", path, e))?;

        Ok(format!("Successfully wrote {} bytes to {path}.", content.len()))
    }
}

// ─────────────────────────────────────────────
// ListFilesTool
// ─────────────────────────────────────────────

/// Lists the entries of one directory, non-recursively.
pub struct ListFilesTool {
    sandbox: Sandbox,
}

impl ListFilesTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        ToolKind::ListFiles.name()
    }

    fn description(&self) -> &str {
        "List the entries of a directory relative to the project root. \
         Directories are marked with a trailing '/'. Defaults to the root."
    }

    fn usage(&self) -> &str {
        r#"<tool_call:list_files path="." />"#
    }

    async fn execute(&self, params: &ToolParams) -> Result<String, ToolError> {
        let path = optional_param(params, "path").unwrap_or(".");
        let resolved = self.sandbox.resolve(path)?;

        let mut reader = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| ToolError::io("listing", path, e))?;

        let mut entries: Vec<String> = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::io("listing", path, e))?
        {
            let mut name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().await.map(|ft| ft.is_dir()).unwrap_or(false);
            if is_dir {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            Ok("(empty directory)".into())
        } else {
            Ok(entries.join("\n"))
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_params(pairs: &[(&str, &str)]) -> ToolParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn sandbox() -> (tempfile::TempDir, Sandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    // ── ReadFileTool ──

    #[tokio::test]
    async fn test_read_file_success() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("hello.txt"), "Hello, Octo!").unwrap();

        let tool = ReadFileTool::new(sandbox);
        let result = tool.execute(&make_params(&[("path", "hello.txt")])).await.unwrap();
        assert_eq!(result, "Hello, Octo!");
    }

    #[tokio::test]
    async fn test_read_file_not_found() {
        let (_dir, sandbox) = sandbox();
        let tool = ReadFileTool::new(sandbox);
        let err = tool
            .execute(&make_params(&[("path", "missing.txt")]))
            .await
            .unwrap_err();
        assert!(err
            .to_observation("read_file")
            .starts_with("Error: reading missing.txt: "));
    }

    #[tokio::test]
    async fn test_read_file_traversal_denied() {
        let (_dir, sandbox) = sandbox();
        let tool = ReadFileTool::new(sandbox);
        let err = tool
            .execute(&make_params(&[("path", "../../etc/passwd")]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_observation("read_file"),
            "Error: Access denied to ../../etc/passwd"
        );
    }

    #[tokio::test]
    async fn test_read_file_missing_path_param() {
        let (_dir, sandbox) = sandbox();
        let tool = ReadFileTool::new(sandbox);
        let err = tool.execute(&ToolParams::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingParameter(ref k) if k == "path"));
    }

    // ── WriteFileTool ──

    #[tokio::test]
    async fn test_write_file_create() {
        let (dir, sandbox) = sandbox();
        let tool = WriteFileTool::new(sandbox);
        let result = tool
            .execute(&make_params(&[("path", "output.txt"), ("content", "Written content")]))
            .await
            .unwrap();
        assert_eq!(result, "Successfully wrote 15 bytes to output.txt.");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("output.txt")).unwrap(),
            "Written content"
        );
    }

    #[tokio::test]
    async fn test_write_file_creates_dirs() {
        let (dir, sandbox) = sandbox();
        let tool = WriteFileTool::new(sandbox);
        tool.execute(&make_params(&[("path", "sub/deep/file.txt"), ("content", "deep")]))
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/deep/file.txt")).unwrap(),
            "deep"
        );
    }

    #[tokio::test]
    async fn test_write_file_outside_root_no_mutation() {
        let parent = tempfile::tempdir().unwrap();
        let root = parent.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let tool = WriteFileTool::new(Sandbox::new(&root).unwrap());

        let err = tool
            .execute(&make_params(&[("path", "../escape.txt"), ("content", "x")]))
            .await
            .unwrap_err();
        assert_eq!(err.to_observation("write_file"), "Error: Access denied to ../escape.txt");
        assert!(!parent.path().join("escape.txt").exists());
    }

    #[tokio::test]
    async fn test_write_file_requires_content() {
        let (_dir, sandbox) = sandbox();
        let tool = WriteFileTool::new(sandbox);
        let err = tool
            .execute(&make_params(&[("path", "a.txt")]))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_observation("write_file"),
            "Error executing 'write_file': Missing required parameter: content"
        );
    }

    #[tokio::test]
    async fn test_write_then_read_exact_content() {
        let (_dir, sandbox) = sandbox();
        let content = "line one\n\tline two\n\nunicode: héllo ✓\n";
        WriteFileTool::new(sandbox.clone())
            .execute(&make_params(&[("path", "notes/round.txt"), ("content", content)]))
            .await
            .unwrap();

        let read = ReadFileTool::new(sandbox)
            .execute(&make_params(&[("path", "notes/round.txt")]))
            .await
            .unwrap();
        assert_eq!(read, content);
    }

    // ── ListFilesTool ──

    #[tokio::test]
    async fn test_list_files_sorted_with_dir_suffix() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let tool = ListFilesTool::new(sandbox);
        let result = tool.execute(&ToolParams::new()).await.unwrap();
        assert_eq!(result, "a.txt\nb.txt\nsrc/");
    }

    #[tokio::test]
    async fn test_list_files_subdir() {
        let (dir, sandbox) = sandbox();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.py"), "").unwrap();

        let tool = ListFilesTool::new(sandbox);
        let result = tool.execute(&make_params(&[("path", "src")])).await.unwrap();
        assert_eq!(result, "a.py");
    }

    #[tokio::test]
    async fn test_list_files_empty() {
        let (_dir, sandbox) = sandbox();
        let tool = ListFilesTool::new(sandbox);
        let result = tool.execute(&make_params(&[("path", ".")])).await.unwrap();
        assert_eq!(result, "(empty directory)");
    }

    #[tokio::test]
    async fn test_list_files_not_a_dir() {
        let (dir, sandbox) = sandbox();
        std::fs::write(dir.path().join("file.txt"), "").unwrap();

        let tool = ListFilesTool::new(sandbox);
        let err = tool
            .execute(&make_params(&[("path", "file.txt")]))
            .await
            .unwrap_err();
        assert!(err
            .to_observation("list_files")
            .starts_with("Error: listing file.txt: "));
    }

    #[tokio::test]
    async fn test_list_files_absolute_outside_denied() {
        let (_dir, sandbox) = sandbox();
        let tool = ListFilesTool::new(sandbox);
        let err = tool.execute(&make_params(&[("path", "/")])).await.unwrap_err();
        assert!(matches!(err, ToolError::AccessDenied(_)));
    }

    // ── Metadata ──

    #[test]
    fn test_tool_metadata() {
        let (_dir, sandbox) = sandbox();
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(ReadFileTool::new(sandbox.clone())),
            Box::new(WriteFileTool::new(sandbox.clone())),
            Box::new(ListFilesTool::new(sandbox)),
        ];
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["read_file", "write_file", "list_files"]);

        for tool in &tools {
            assert!(!tool.description().is_empty());
            assert!(tool.usage().contains(&format!("<tool_call:{}", tool.name())));
        }
        assert!(!tools[0].requires_confirmation());
        assert!(tools[1].requires_confirmation());
        assert!(!tools[2].requires_confirmation());
    }
}
