//! Development stand-in for the internal API.
//!
//! It reads the forwarded bearer token without verifying it, only to show
//! which identity reached it. Never deploy this.

use axum::{
    Router,
    extract::Query,
    http::HeaderMap,
    response::Json,
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::strip_bearer_prefix;
use crate::internal_api::models::{OrgSummary, PagedResult};

const STUB_ITEM_COUNT: u32 = 200;

pub fn create_router() -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/org/summary", get(org_summary))
        .route("/items/search", get(search_items))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve the stub on `bind` until the process exits.
pub async fn serve(bind: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Internal API stub listening on http://{}", bind);
    axum::serve(listener, create_router()).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "ok"
}

async fn org_summary(headers: HeaderMap) -> Json<OrgSummary> {
    let claims = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(strip_bearer_prefix)
        .and_then(|token| peek_claims(token.trim()));

    let claim = |name: &str| {
        claims
            .as_ref()
            .and_then(|c| c.get(name))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    };

    tracing::debug!(sub = %claim("sub"), "Stub org summary requested");

    Json(OrgSummary {
        org_id: claim("orgId"),
        org_name: "Stub Org".to_string(),
        active_users: 123,
        open_items: 9,
    })
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_page_size", rename = "pageSize")]
    page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

async fn search_items(Query(params): Query<SearchParams>) -> Json<PagedResult<String>> {
    let needle = params.query.to_lowercase();
    let matches: Vec<String> = (1..=STUB_ITEM_COUNT)
        .map(|i| format!("item-{}", i))
        .filter(|item| item.to_lowercase().contains(&needle))
        .collect();

    Json(PagedResult::paginate(
        &matches,
        params.page.max(1),
        params.page_size,
    ))
}

/// Decode the payload segment of a JWT without checking anything.
fn peek_claims(token: &str) -> Option<Map<String, Value>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}
