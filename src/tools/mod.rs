//! Tool handler registry for MCP tool implementations.
//!
//! Every tool except `echo` resolves the caller before doing any work, so an
//! unauthenticated session can list tools but not use them.

mod registry;

pub use registry::{
    ToolContext, ToolError, ToolFuture, ToolHandler, ToolRegistry, UNAUTHORIZED_ERROR_CODE,
    json_result,
};

mod echo;
mod org_summary;
mod search_items;

pub use echo::EchoHandler;
pub use org_summary::OrgSummaryHandler;
pub use search_items::SearchItemsHandler;

/// Registry with every tool this server exposes.
pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new()
        .register_handler(EchoHandler)
        .register_handler(OrgSummaryHandler)
        .register_handler(SearchItemsHandler)
}
