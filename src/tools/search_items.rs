//! Handler for the `search_items` tool.

use rmcp::model::JsonObject;
use serde_json::json;
use tracing::info;

use crate::tools::registry::{ToolFuture, json_result, optional_i64, required_str};
use crate::tools::{ToolContext, ToolHandler};

const DEFAULT_PAGE_SIZE: u32 = 10;

pub struct SearchItemsHandler;

/// Normalize requested paging against the configured maximum page size.
///
/// `page < 1` becomes 1, `page_size < 1` becomes the default, and anything
/// above `max_page_size` is capped.
pub(crate) fn clamp_paging(page: Option<i64>, page_size: Option<i64>, max_page_size: u32) -> (u32, u32) {
    let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
    let page_size = match page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64) {
        n if n < 1 => DEFAULT_PAGE_SIZE,
        n => n.min(u32::MAX as i64) as u32,
    };
    (page, page_size.min(max_page_size.max(1)))
}

impl ToolHandler for SearchItemsHandler {
    fn name(&self) -> &str {
        "search_items"
    }

    fn title(&self) -> Option<&str> {
        Some("Search Items")
    }

    fn description(&self) -> &str {
        "Searches items in the caller's organization."
    }

    fn input_schema(&self) -> JsonObject {
        let mut schema = JsonObject::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert(
            "properties".to_string(),
            json!({
                "query": {
                    "type": "string",
                    "description": "Search text",
                },
                "page": {
                    "type": "integer",
                    "description": "Page number (1-based)",
                    "default": 1,
                },
                "pageSize": {
                    "type": "integer",
                    "description": "Page size (capped at the configured maximum)",
                    "default": DEFAULT_PAGE_SIZE,
                },
            }),
        );
        schema.insert("required".to_string(), json!(["query"]));
        schema
    }

    fn execute(&self, args: JsonObject, ctx: &ToolContext) -> ToolFuture<'_> {
        let ctx = ctx.clone();

        Box::pin(async move {
            let caller = ctx.caller.get_current().await?;

            let query = required_str(&args, "query")?;
            let (page, page_size) = clamp_paging(
                optional_i64(&args, "page")?,
                optional_i64(&args, "pageSize")?,
                ctx.api.max_page_size(),
            );

            info!(
                user_id = %caller.user_id(),
                org_id = %caller.org_id(),
                page,
                page_size,
                "Tool call: search_items"
            );

            let result = ctx
                .api
                .search_items(query, page, page_size, &ctx.cancellation)
                .await?;
            json_result(&result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_paging() {
        assert_eq!(clamp_paging(None, None, 50), (1, 10));
        assert_eq!(clamp_paging(Some(0), Some(0), 50), (1, 10));
        assert_eq!(clamp_paging(Some(-4), Some(-1), 50), (1, 10));
        assert_eq!(clamp_paging(Some(3), Some(25), 50), (3, 25));
        assert_eq!(clamp_paging(Some(2), Some(500), 50), (2, 50));
        assert_eq!(clamp_paging(Some(1), None, 5), (1, 5));
    }
}
