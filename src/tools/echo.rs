//! Handler for the `echo` tool.

use rmcp::model::{CallToolResult, Content, JsonObject};
use serde_json::json;

use crate::tools::registry::{ToolFuture, required_str};
use crate::tools::{ToolContext, ToolHandler};

/// Echoes a message back. Needs no caller identity.
pub struct EchoHandler;

impl ToolHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes the provided message back to the caller. Safe read-only demo tool."
    }

    fn input_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            json!({
                "message": {
                    "type": "string",
                    "description": "Any text to echo back.",
                }
            }),
        );
        schema.insert("required".to_string(), json!(["message"]));
        schema
    }

    fn execute(&self, args: JsonObject, _ctx: &ToolContext) -> ToolFuture<'_> {
        Box::pin(async move {
            let message = required_str(&args, "message")?;
            Ok(CallToolResult {
                content: vec![Content::text(format!("echo: {}", message))],
                structured_content: None,
                is_error: Some(false),
                meta: None,
            })
        })
    }
}
