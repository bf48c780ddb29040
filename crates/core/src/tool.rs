//! Tool trait: the abstraction over model-invocable capabilities.
//!
//! Tools are what let the model reach the course indices: search lesson
//! content, fetch a course outline. Each call may also record [`Source`]s,
//! which are collected in the per-request [`RequestContext`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use crate::course::Source;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_use id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content, sent back to the model verbatim
    pub output: String,

    /// Provenance for the content in `output`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            output: output.into(),
            sources: Vec::new(),
        }
    }

    pub fn failed(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            output: output.into(),
            sources: Vec::new(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<Source>) -> Self {
        self.sources = sources;
        self
    }
}

/// The core Tool trait.
///
/// Each capability (`search_course_content`, `get_course_outline`)
/// implements this trait and is registered in the [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "search_course_content").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Per-request scratch state shared between the generator and the tools it
/// dispatches. Created fresh for every query and dropped with it.
#[derive(Debug, Default)]
pub struct RequestContext {
    sources: Vec<Source>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append sources in the order they were produced.
    pub fn record_sources(&mut self, sources: impl IntoIterator<Item = Source>) {
        self.sources.extend(sources);
    }

    pub fn last_sources(&self) -> &[Source] {
        &self.sources
    }

    /// Move the collected sources out, leaving the buffer empty.
    pub fn take_sources(&mut self) -> Vec<Source> {
        std::mem::take(&mut self.sources)
    }

    pub fn reset_sources(&mut self) {
        self.sources.clear();
    }
}

/// A registry of available tools, ordered by name.
///
/// The generator uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Look up and execute tools when the model requests them
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Execute a tool call, surfacing failures as `ToolError`.
    pub async fn execute(&self, call: &ToolCall) -> std::result::Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// Execute a tool call and fold every failure into the result text.
    ///
    /// Sources from the result are appended to `ctx`.
    pub async fn execute_tool(&self, call: &ToolCall, ctx: &mut RequestContext) -> ToolResult {
        match self.execute(call).await {
            Ok(result) => {
                debug!(
                    tool = %call.name,
                    success = result.success,
                    sources = result.sources.len(),
                    "Tool executed"
                );
                ctx.record_sources(result.sources.iter().cloned());
                result
            }
            Err(ToolError::NotFound(name)) => {
                warn!(tool = %name, "Model requested an unknown tool");
                ToolResult::failed(&call.id, format!("Tool '{name}' not found"))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::failed(&call.id, format!("Error: {e}"))
            }
        }
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes the input and cites it as a source.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?
                .to_string();
            Ok(ToolResult::ok("", text.clone()).with_sources(vec![Source::new(text, None)]))
        }
    }

    struct AlphaTool;

    #[async_trait]
    impl Tool for AlphaTool {
        fn name(&self) -> &str {
            "alpha"
        }
        fn description(&self) -> &str {
            "Does nothing"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> std::result::Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("", "ok"))
        }
    }

    fn call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn definitions_are_ordered_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(AlphaTool));
        let names: Vec<String> = registry.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["alpha", "echo"]);
        assert_eq!(registry.names(), vec!["alpha", "echo"]);
    }

    #[tokio::test]
    async fn execute_stamps_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let result = registry
            .execute(&call("call_1", "echo", serde_json::json!({"text": "hello world"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.call_id, "call_1");
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn raw_execute_missing_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute(&call("call_1", "nonexistent", serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_text() {
        let registry = ToolRegistry::new();
        let mut ctx = RequestContext::new();
        let result = registry
            .execute_tool(&call("call_9", "teleport", serde_json::json!({})), &mut ctx)
            .await;
        assert!(!result.success);
        assert_eq!(result.call_id, "call_9");
        assert_eq!(result.output, "Tool 'teleport' not found");
        assert!(ctx.last_sources().is_empty());
    }

    #[tokio::test]
    async fn tool_error_becomes_error_text() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let mut ctx = RequestContext::new();
        let result = registry
            .execute_tool(&call("call_2", "echo", serde_json::json!({})), &mut ctx)
            .await;
        assert!(!result.success);
        assert_eq!(result.output, "Error: Invalid tool arguments: missing 'text'");
    }

    #[tokio::test]
    async fn sources_accumulate_in_call_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let mut ctx = RequestContext::new();

        registry
            .execute_tool(&call("a", "echo", serde_json::json!({"text": "first"})), &mut ctx)
            .await;
        registry
            .execute_tool(&call("b", "echo", serde_json::json!({"text": "second"})), &mut ctx)
            .await;

        let texts: Vec<&str> = ctx.last_sources().iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        let taken = ctx.take_sources();
        assert_eq!(taken.len(), 2);
        assert!(ctx.last_sources().is_empty());
    }

    #[test]
    fn reset_clears_sources() {
        let mut ctx = RequestContext::new();
        ctx.record_sources(vec![Source::new("Intro to X - Lesson 1", None)]);
        ctx.reset_sources();
        assert!(ctx.last_sources().is_empty());
    }
}
