//! MCP server implementation using rmcp.
//!
//! STDIO mode runs a single `McpServer` fed by the environment token source.
//! HTTP mode creates one `McpServer` per MCP session, each with its own
//! header token source, caller cache and forwarding client.

use std::sync::Arc;

use anyhow::Result;
use axum::{Router, routing::get};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp::{
    ErrorData as McpError,
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
};
use tower_http::trace::TraceLayer;

use crate::auth::{CallerContextResolver, TokenSource, TokenValidator};
use crate::config::AppConfig;
use crate::internal_api::{CredentialForwarder, InternalApiClient};
use crate::tools::{ToolContext, ToolRegistry};

/// Type alias for HTTP request parts stored in rmcp extensions.
type HttpParts = http::request::Parts;

/// Shared, session-independent state used to build per-session servers.
#[derive(Clone)]
pub struct SessionFactory {
    config: Arc<AppConfig>,
    validator: Arc<TokenValidator>,
    tool_registry: Arc<ToolRegistry>,
    api: InternalApiClient,
}

impl SessionFactory {
    pub fn new(config: AppConfig, tool_registry: ToolRegistry) -> Result<Self> {
        let validator = Arc::new(TokenValidator::new(&config.jwt));
        // Placeholder credentials; every session swaps in its own forwarder.
        let api = InternalApiClient::new(
            &config.internal_api,
            CredentialForwarder::new(TokenSource::header()),
        )?;

        Ok(Self {
            config: Arc::new(config),
            validator,
            tool_registry: Arc::new(tool_registry),
            api,
        })
    }

    /// Build a server whose caller identity comes from `source`.
    pub fn session(&self, source: TokenSource) -> McpServer {
        let resolver = Arc::new(CallerContextResolver::new(
            source.clone(),
            self.validator.clone(),
            &self.config.jwt,
        ));
        let api = self.api.with_forwarder(CredentialForwarder::new(source));
        McpServer::new(self.tool_registry.clone(), resolver, api)
    }

    /// Server for STDIO mode, reading `MCP_BEARER_TOKEN`.
    pub fn stdio_session(&self) -> McpServer {
        self.session(TokenSource::env())
    }

    /// Server for one HTTP session, reading the `Authorization` header.
    pub fn http_session(&self) -> McpServer {
        self.session(TokenSource::header())
    }
}

/// MCP server that handles protocol requests and delegates to tool handlers.
#[derive(Clone)]
pub struct McpServer {
    tool_registry: Arc<ToolRegistry>,
    resolver: Arc<CallerContextResolver>,
    api: InternalApiClient,
}

impl McpServer {
    pub fn new(
        tool_registry: Arc<ToolRegistry>,
        resolver: Arc<CallerContextResolver>,
        api: InternalApiClient,
    ) -> Self {
        Self {
            tool_registry,
            resolver,
            api,
        }
    }

    /// Get the tool registry.
    pub fn tool_registry(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// Get this session's caller resolver.
    pub fn resolver(&self) -> &Arc<CallerContextResolver> {
        &self.resolver
    }

    fn observe_request(&self, context: &RequestContext<RoleServer>) {
        // rmcp stores http::request::Parts in extensions for HTTP transport only.
        if let Some(parts) = context.extensions.get::<HttpParts>() {
            let authorization = parts
                .headers
                .get(http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            self.resolver
                .token_source()
                .observe_authorization(authorization);
        }
    }
}

impl ServerHandler for McpServer {
    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let result = ListToolsResult {
            tools: self.tool_registry.list_tools(),
            next_cursor: None,
            ..Default::default()
        };
        std::future::ready(Ok(result))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        self.observe_request(&context);

        let tool_name = request.name.to_string();
        let args = request.arguments.unwrap_or_default();
        let registry = self.tool_registry.clone();
        let ctx = ToolContext {
            caller: self.resolver.clone(),
            api: self.api.clone(),
            cancellation: context.ct.clone(),
        };

        async move {
            registry
                .call_tool(&tool_name, args, &ctx)
                .await
                .map_err(|e| {
                    tracing::warn!(tool = %tool_name, error = %e, "Tool call failed");
                    McpError::from(e)
                })
        }
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Acme MCP server. Tools act on behalf of the caller identified by the \
                 bearer JWT (MCP_BEARER_TOKEN in STDIO mode, the Authorization header \
                 in HTTP mode)."
                    .to_string(),
            ),
        }
    }
}

async fn health_check() -> &'static str {
    "ok"
}

/// Router exposing the MCP endpoint at `/mcp` and a health check at `/healthz`.
pub fn create_http_router(factory: SessionFactory) -> Router {
    let service = StreamableHttpService::new(
        move || Ok(factory.http_session()),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .route("/healthz", get(health_check))
        .nest_service("/mcp", service)
        .layer(TraceLayer::new_for_http())
}

/// Start the server as an MCP Streamable HTTP server.
///
/// `bind` is e.g. `127.0.0.1:3004` or `0.0.0.0:3004`.
pub async fn start_mcp_http(factory: SessionFactory, bind: &str) -> Result<()> {
    let router = create_http_router(factory);
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!("MCP HTTP server listening on http://{}/mcp", bind);

    axum::serve(listener, router).await?;

    Ok(())
}
