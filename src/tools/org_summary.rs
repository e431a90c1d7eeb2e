//! Handler for the `get_my_org_summary` tool.

use rmcp::model::JsonObject;
use serde_json::json;
use tracing::info;

use crate::tools::registry::{ToolFuture, json_result};
use crate::tools::{ToolContext, ToolHandler};

pub struct OrgSummaryHandler;

impl ToolHandler for OrgSummaryHandler {
    fn name(&self) -> &str {
        "get_my_org_summary"
    }

    fn title(&self) -> Option<&str> {
        Some("My Organization Summary")
    }

    fn description(&self) -> &str {
        "Returns a summary for the caller's organization."
    }

    fn input_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), json!({}));
        schema
    }

    fn output_schema(&self) -> Option<JsonObject> {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            json!({
                "orgId": { "type": "string" },
                "orgName": { "type": "string" },
                "activeUsers": { "type": "integer" },
                "openItems": { "type": "integer" },
            }),
        );
        Some(schema)
    }

    fn execute(&self, _args: JsonObject, ctx: &ToolContext) -> ToolFuture<'_> {
        let ctx = ctx.clone();

        Box::pin(async move {
            let caller = ctx.caller.get_current().await?;
            info!(
                user_id = %caller.user_id(),
                org_id = %caller.org_id(),
                "Tool call: get_my_org_summary"
            );

            let summary = ctx.api.get_my_org_summary(&ctx.cancellation).await?;
            json_result(&summary)
        })
    }
}
