// Core modules
pub mod auth;
pub mod config;
pub mod internal_api;
mod types;

pub mod server;
mod tools;

// Re-export key types and functions
pub use auth::{CallerContext, CallerContextResolver, MintRequest, TokenMinter, TokenSource};
pub use config::{AppConfig, load_app_config};
pub use server::{McpServer, SessionFactory, start_mcp_http};
pub use tools::{ToolHandler, ToolRegistry};
pub use types::{OrgId, UserId};

use anyhow::Result;

/// Convenience function to build the session factory with every tool
/// registered.
///
/// Validates `config` first so misconfiguration fails at startup rather than
/// on the first tool call.
pub fn create_server(config: AppConfig) -> Result<SessionFactory> {
    config.validate()?;
    SessionFactory::new(config, tools::default_registry())
}
