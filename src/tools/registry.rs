//! Tool registry for managing MCP tool handlers.
//!
//! Provides a `ToolHandler` trait for implementing tools and a `ToolRegistry`
//! for registering and invoking them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content, ErrorCode, JsonObject, Tool as McpTool};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::auth::{CallerContextResolver, Unauthorized};
use crate::internal_api::{ApiError, InternalApiClient};

/// JSON-RPC error code returned when the caller cannot be authenticated.
pub const UNAUTHORIZED_ERROR_CODE: i32 = -32001;

/// Context passed to tool handlers during execution.
#[derive(Clone)]
pub struct ToolContext {
    /// Caller identity for this session.
    pub caller: Arc<CallerContextResolver>,
    /// Internal API client carrying this session's credentials.
    pub api: InternalApiClient,
    /// Fires when the client cancels the request.
    pub cancellation: CancellationToken,
}

/// Tool execution failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Caller could not be authenticated.
    Unauthorized(String),
    /// Missing or malformed arguments.
    InvalidArguments(String),
    /// The internal API call failed.
    Upstream(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized(reason) => write!(f, "Unauthorized: {}", reason),
            Self::InvalidArguments(msg) => write!(f, "Invalid arguments: {}", msg),
            Self::Upstream(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ToolError {}

impl From<Unauthorized> for ToolError {
    fn from(err: Unauthorized) -> Self {
        Self::Unauthorized(err.reason().to_string())
    }
}

impl From<ApiError> for ToolError {
    fn from(err: ApiError) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Unauthorized(_) => McpError::new(
                ErrorCode(UNAUTHORIZED_ERROR_CODE),
                err.to_string(),
                None,
            ),
            ToolError::InvalidArguments(_) => McpError::invalid_params(err.to_string(), None),
            ToolError::Upstream(msg) => {
                McpError::internal_error(format!("Tool execution failed: {}", msg), None)
            }
        }
    }
}

/// Wrap a serializable value as a successful tool result.
///
/// The value is sent both as JSON text and as structured content.
pub fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, ToolError> {
    let structured = serde_json::to_value(value)
        .map_err(|e| ToolError::Upstream(format!("failed to encode result: {}", e)))?;
    Ok(CallToolResult {
        content: vec![Content::text(structured.to_string())],
        structured_content: Some(structured),
        is_error: Some(false),
        meta: None,
    })
}

/// Boxed future returned by `ToolHandler::execute`.
pub type ToolFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CallToolResult, ToolError>> + Send + 'a>>;

/// Trait for handling MCP tool invocations.
///
/// Each tool implements this trait to define its schema and execution logic.
pub trait ToolHandler: Send + Sync {
    /// Returns the tool's name (e.g., "search_items").
    fn name(&self) -> &str;

    /// Returns the tool's human-readable title.
    fn title(&self) -> Option<&str> {
        None
    }

    /// Returns the tool's description.
    fn description(&self) -> &str;

    /// Returns the input schema for this tool.
    fn input_schema(&self) -> JsonObject;

    /// Returns the output schema for this tool (optional).
    fn output_schema(&self) -> Option<JsonObject> {
        None
    }

    /// Executes the tool with the given arguments.
    fn execute(&self, args: JsonObject, ctx: &ToolContext) -> ToolFuture<'_>;

    /// Converts this handler to an `McpTool` for use in `list_tools`.
    fn to_mcp_tool(&self) -> McpTool {
        use std::borrow::Cow;

        McpTool {
            name: Cow::Owned(self.name().to_string()),
            title: self.title().map(|s| s.to_string()),
            description: Some(Cow::Owned(self.description().to_string())),
            input_schema: Arc::new(self.input_schema()),
            output_schema: self.output_schema().map(Arc::new),
            annotations: None,
            icons: None,
            meta: None,
        }
    }
}

/// Registry for managing tool handlers.
#[derive(Clone)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a tool handler from a type that implements `ToolHandler`.
    pub fn register_handler<T: ToolHandler + 'static>(mut self, handler: T) -> Self {
        self.handlers.insert(handler.name().to_string(), Arc::new(handler));
        self
    }

    /// Get a tool handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.get(name).cloned()
    }

    /// All registered tools, sorted by name.
    pub fn list_tools(&self) -> Vec<McpTool> {
        let mut tools: Vec<McpTool> = self
            .handlers
            .values()
            .map(|handler| handler.to_mcp_tool())
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Execute a tool by name with the given arguments.
    pub async fn call_tool(
        &self,
        name: &str,
        args: JsonObject,
        ctx: &ToolContext,
    ) -> Result<CallToolResult, ToolError> {
        let handler = self
            .get(name)
            .ok_or_else(|| ToolError::InvalidArguments(format!("Tool not found: {}", name)))?;
        handler.execute(args, ctx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Required string argument.
pub(crate) fn required_str<'a>(args: &'a JsonObject, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("`{}` must be a string", key)))
}

/// Optional integer argument; absent or null yields `None`.
pub(crate) fn optional_i64(args: &JsonObject, key: &str) -> Result<Option<i64>, ToolError> {
    match args.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ToolError::InvalidArguments(format!("`{}` must be an integer", key))),
    }
}
