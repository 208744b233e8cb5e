//! Tool contract (§6): a tool is `{ name, description, argsSchema, dangerLevel,
//! execute(args, ctx) }`. The kernel wraps every mutating tool through the
//! file-change journal (U) before/after invocation; this crate only defines
//! the contract and a small built-in registry so the kernel has something
//! concrete to dispatch through in tests. A full tool catalogue (MCP bridges,
//! LSP-aware edits, etc.) is out of scope (§1).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerLevel {
    Safe,
    Moderate,
    Dangerous,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into(), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, output: String::new(), error: Some(error.into()) }
    }
}

/// Context handed to every tool invocation. Cancellation is cooperative
/// (§5): long-running tools are expected to poll `cancel`.
pub struct ToolContext {
    pub session_id: String,
    pub turn_number: u32,
    pub cancel: CancellationToken,
    pub workspace_root: PathBuf,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArgs { tool: String, reason: String },
    #[error("tool cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(String),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn args_schema(&self) -> serde_json::Value;
    fn danger_level(&self) -> DangerLevel;

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError>;
}

/// Registry of available tools, keyed by name. Cloneable: internally an
/// `Arc<HashMap<..>>` so the kernel and every worker in a swarm can share one
/// registry without re-registering built-ins per session.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let map = tools.into_iter().map(|t| (t.name().to_string(), t)).collect();
        Self { tools: Arc::new(map) }
    }

    pub fn with_builtins() -> Self {
        Self::new(vec![
            Arc::new(ReadFileTool) as Arc<dyn Tool>,
            Arc::new(WriteFileTool) as Arc<dyn Tool>,
            Arc::new(EditFileTool) as Arc<dyn Tool>,
            Arc::new(BashStubTool) as Arc<dyn Tool>,
        ])
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn definitions(&self) -> Vec<(String, String, serde_json::Value)> {
        self.tools.values().map(|t| (t.name().to_string(), t.description().to_string(), t.args_schema())).collect()
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        if ctx.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        tool.execute(args, ctx).await
    }
}

/// Validates every registered tool's JSON schema is at least a well-formed
/// object, the way the teacher's tool-loading path sanity-checks before
/// exposing schemas to a provider.
pub fn validate_tool_schemas(registry: &ToolRegistry) -> Result<(), ToolError> {
    for (name, _desc, schema) in registry.definitions() {
        if !schema.is_object() {
            return Err(ToolError::InvalidArgs { tool: name, reason: "argsSchema must be a JSON object".to_string() });
        }
    }
    Ok(())
}

fn arg_str(args: &serde_json::Value, tool: &str, field: &str) -> Result<String, ToolError> {
    args.get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArgs { tool: tool.to_string(), reason: format!("missing string field `{field}`") })
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read a UTF-8 text file and return its contents."
    }
    fn args_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]})
    }
    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Safe
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let path = arg_str(&args, self.name(), "path")?;
        let full = ctx.workspace_root.join(&path);
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(ToolOutcome::ok(content)),
            Err(e) => Ok(ToolOutcome::failed(e.to_string())),
        }
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }
    fn description(&self) -> &str {
        "Create or overwrite a UTF-8 text file with the given content."
    }
    fn args_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "content": {"type": "string"}},
            "required": ["path", "content"],
        })
    }
    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Moderate
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let path = arg_str(&args, self.name(), "path")?;
        let content = arg_str(&args, self.name(), "content")?;
        let full = ctx.workspace_root.join(&path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| ToolError::Io(e.to_string()))?;
        }
        tokio::fs::write(&full, &content).await.map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(ToolOutcome::ok(format!("wrote {} bytes to {}", content.len(), path)))
    }
}

pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }
    fn description(&self) -> &str {
        "Replace the first occurrence of `find` with `replace` in a file."
    }
    fn args_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"path": {"type": "string"}, "find": {"type": "string"}, "replace": {"type": "string"}},
            "required": ["path", "find", "replace"],
        })
    }
    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Moderate
    }

    async fn execute(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let path = arg_str(&args, self.name(), "path")?;
        let find = arg_str(&args, self.name(), "find")?;
        let replace = arg_str(&args, self.name(), "replace")?;
        let full = ctx.workspace_root.join(&path);
        let before = tokio::fs::read_to_string(&full).await.map_err(|e| ToolError::Io(e.to_string()))?;
        if !before.contains(&find) {
            return Ok(ToolOutcome::failed(format!("`{find}` not found in {path}")));
        }
        let after = before.replacen(&find, &replace, 1);
        tokio::fs::write(&full, &after).await.map_err(|e| ToolError::Io(e.to_string()))?;
        Ok(ToolOutcome::ok(format!("edited {path}")))
    }
}

/// Placeholder for a shell-execution tool. Real process spawning is an
/// external collaborator's concern (§1); this stub only exercises the
/// danger-level/cancellation plumbing in tests.
pub struct BashStubTool;

#[async_trait]
impl Tool for BashStubTool {
    fn name(&self) -> &str {
        "bash"
    }
    fn description(&self) -> &str {
        "Stub: would execute a shell command. Not implemented in this core."
    }
    fn args_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {"command": {"type": "string"}}, "required": ["command"]})
    }
    fn danger_level(&self) -> DangerLevel {
        DangerLevel::Critical
    }

    async fn execute(&self, _args: serde_json::Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        if ctx.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        Ok(ToolOutcome::failed("bash execution is not implemented by agentcore-tools"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ctx(root: PathBuf) -> ToolContext {
        ToolContext { session_id: "s1".to_string(), turn_number: 1, cancel: CancellationToken::new(), workspace_root: root }
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let registry = ToolRegistry::with_builtins();
        let c = ctx(dir.path().to_path_buf());

        let write = registry
            .execute("write_file", serde_json::json!({"path": "a.txt", "content": "hi"}), &c)
            .await
            .unwrap();
        assert!(write.success);

        let read = registry.execute("read_file", serde_json::json!({"path": "a.txt"}), &c).await.unwrap();
        assert_eq!(read.output, "hi");
    }

    #[tokio::test]
    async fn edit_replaces_first_match() {
        let dir = tempdir().unwrap();
        let registry = ToolRegistry::with_builtins();
        let c = ctx(dir.path().to_path_buf());
        registry.execute("write_file", serde_json::json!({"path": "a.txt", "content": "foo bar foo"}), &c).await.unwrap();
        let edit = registry
            .execute("edit_file", serde_json::json!({"path": "a.txt", "find": "foo", "replace": "baz"}), &c)
            .await
            .unwrap();
        assert!(edit.success);
        let read = registry.execute("read_file", serde_json::json!({"path": "a.txt"}), &c).await.unwrap();
        assert_eq!(read.output, "baz bar foo");
    }

    #[tokio::test]
    async fn unknown_tool_errors() {
        let dir = tempdir().unwrap();
        let registry = ToolRegistry::with_builtins();
        let c = ctx(dir.path().to_path_buf());
        let result = registry.execute("does_not_exist", serde_json::Value::Null, &c).await;
        assert!(matches!(result, Err(ToolError::UnknownTool(_))));
    }

    #[test]
    fn all_builtin_schemas_are_objects() {
        let registry = ToolRegistry::with_builtins();
        assert!(validate_tool_schemas(&registry).is_ok());
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits_execution() {
        let dir = tempdir().unwrap();
        let registry = ToolRegistry::with_builtins();
        let mut c = ctx(dir.path().to_path_buf());
        c.cancel.cancel();
        let result = registry.execute("read_file", serde_json::json!({"path": "a.txt"}), &c).await;
        assert!(matches!(result, Err(ToolError::Cancelled)));
    }
}
