//! Caller context resolution.
//!
//! Turns the session's bearer token into a [`CallerContext`] once, then
//! serves every later call from the cache. Every failure collapses into a
//! single [`Unauthorized`] value carrying a non-sensitive reason.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::context::CallerContext;
use crate::auth::token_source::{TokenSource, normalize_bearer};
use crate::auth::validator::{ClaimSet, TokenValidator};
use crate::config::JwtConfig;
use crate::types::{OrgId, UserId};

/// Name-identifier claim types, preferred over `sub` in this order.
pub const NAME_IDENTIFIER_CLAIMS: [&str; 2] = [
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
    "nameid",
];

pub const SUBJECT_CLAIM: &str = "sub";

/// The only failure the resolver reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unauthorized {
    reason: String,
}

impl Unauthorized {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Human-readable reason. Never contains the token or signing key.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for Unauthorized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unauthorized: {}", self.reason)
    }
}

impl std::error::Error for Unauthorized {}

#[derive(Default)]
struct CacheSlot {
    context: Option<CallerContext>,
    last_failure: Option<Unauthorized>,
}

/// Resolves and caches the caller for one process (STDIO) or one MCP
/// session (HTTP).
pub struct CallerContextResolver {
    source: TokenSource,
    validator: Arc<TokenValidator>,
    org_id_claim: String,
    roles_claim: String,
    cache: Mutex<CacheSlot>,
    /// Completed resolution attempts; lets callers that queued behind an
    /// in-flight attempt reuse its failure instead of validating again.
    attempts: AtomicU64,
}

impl CallerContextResolver {
    pub fn new(source: TokenSource, validator: Arc<TokenValidator>, config: &JwtConfig) -> Self {
        Self {
            source,
            validator,
            org_id_claim: config.org_id_claim.clone(),
            roles_claim: config.roles_claim.clone(),
            cache: Mutex::new(CacheSlot::default()),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn token_source(&self) -> &TokenSource {
        &self.source
    }

    /// Return the caller for this session, validating the token on first use.
    ///
    /// Concurrent first callers share one validation: whoever wins the lock
    /// validates and logs, the rest get its context or its failure. Failures
    /// are not cached for later, non-racing calls.
    pub async fn get_current(&self) -> Result<CallerContext, Unauthorized> {
        let seen = self.attempts.load(Ordering::Acquire);
        let mut slot = self.cache.lock().await;

        if let Some(ctx) = &slot.context {
            return Ok(ctx.clone());
        }
        if self.attempts.load(Ordering::Acquire) != seen
            && let Some(failure) = &slot.last_failure
        {
            return Err(failure.clone());
        }

        let result = self.resolve();
        match &result {
            Ok(ctx) => {
                slot.context = Some(ctx.clone());
                slot.last_failure = None;
            }
            Err(failure) => slot.last_failure = Some(failure.clone()),
        }
        self.attempts.fetch_add(1, Ordering::Release);

        result
    }

    fn resolve(&self) -> Result<CallerContext, Unauthorized> {
        let raw = self.source.get_token().unwrap_or_default();
        let token = normalize_bearer(&raw);
        if token.is_empty() {
            return Err(Unauthorized::new(format!(
                "missing bearer token; {}",
                self.source.describe()
            )));
        }

        let claims = self.validator.validate(token).map_err(|e| {
            warn!(reason = %e, "Bearer token validation failed");
            Unauthorized::new(format!("invalid bearer token ({})", e))
        })?;

        let user_id = NAME_IDENTIFIER_CLAIMS
            .iter()
            .chain(std::iter::once(&SUBJECT_CLAIM))
            .find_map(|name| non_blank(&claims, name))
            .ok_or_else(|| Unauthorized::new("missing required claim 'sub' or 'nameidentifier'"))?;

        let org_id = non_blank(&claims, &self.org_id_claim).ok_or_else(|| {
            Unauthorized::new(format!("missing required claim '{}'", self.org_id_claim))
        })?;

        let roles = split_roles(claims.all(&self.roles_claim));

        let ctx = CallerContext::new(UserId::new(user_id), OrgId::new(org_id), roles);
        info!(
            user_id = %ctx.user_id(),
            org_id = %ctx.org_id(),
            roles_count = ctx.roles().len(),
            "Authenticated MCP caller"
        );

        Ok(ctx)
    }
}

fn non_blank<'a>(claims: &'a ClaimSet, name: &str) -> Option<&'a str> {
    claims.first(name).filter(|v| !v.trim().is_empty())
}

/// Split every value on commas, trim, drop empties, keep encounter order.
fn split_roles(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::mint::TokenMinter;
    use crate::auth::validator::Clock;
    use serde_json::{Value, json};

    const NOW: i64 = 1_760_000_000;

    fn config() -> JwtConfig {
        JwtConfig {
            issuer: "acme-dev-issuer".into(),
            audience: "acme-mcp-dev".into(),
            signing_key: "DEV_ONLY__replace_me_with_32chars_minimum!!".into(),
            ..Default::default()
        }
    }

    fn claims(extra: Value) -> Value {
        let mut base = json!({
            "iss": "acme-dev-issuer",
            "aud": "acme-mcp-dev",
            "nbf": NOW - 60,
            "exp": NOW + 3600,
        });
        if let (Some(map), Value::Object(extra)) = (base.as_object_mut(), extra) {
            map.extend(extra);
        }
        base
    }

    fn sign(payload: Value) -> String {
        TokenMinter::new(&config()).sign(&payload).unwrap()
    }

    fn resolver_with(source: TokenSource, cfg: &JwtConfig) -> CallerContextResolver {
        let validator = Arc::new(TokenValidator::with_clock(cfg, Clock::Fixed(NOW)));
        CallerContextResolver::new(source, validator, cfg)
    }

    fn header_resolver(token: &str) -> CallerContextResolver {
        let source = TokenSource::header();
        source.observe_authorization(Some(&format!("Bearer {}", token)));
        resolver_with(source, &config())
    }

    #[tokio::test]
    async fn test_resolves_concrete_caller() {
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9", "roles": "Reader"})));
        let ctx = header_resolver(&token).get_current().await.unwrap();

        assert_eq!(ctx.user_id().as_str(), "u1");
        assert_eq!(ctx.org_id().as_str(), "org-9");
        assert_eq!(ctx.roles(), ["Reader"]);
    }

    #[tokio::test]
    async fn test_comma_delimited_roles_are_split() {
        let token = sign(claims(
            json!({"sub": "u1", "orgId": "org-9", "roles": "Reader,Writer"}),
        ));
        let ctx = header_resolver(&token).get_current().await.unwrap();
        assert_eq!(ctx.roles(), ["Reader", "Writer"]);
    }

    #[tokio::test]
    async fn test_repeated_roles_are_concatenated_in_order() {
        let token = sign(claims(
            json!({"sub": "u1", "orgId": "org-9", "roles": ["Reader", "Admin,Ops"]}),
        ));
        let ctx = header_resolver(&token).get_current().await.unwrap();
        assert_eq!(ctx.roles(), ["Reader", "Admin", "Ops"]);
    }

    #[tokio::test]
    async fn test_roles_are_trimmed_and_not_deduplicated() {
        let token = sign(claims(
            json!({"sub": "u1", "orgId": "org-9", "roles": [" Reader , ,Writer,", "Reader"]}),
        ));
        let ctx = header_resolver(&token).get_current().await.unwrap();
        assert_eq!(ctx.roles(), ["Reader", "Writer", "Reader"]);
    }

    #[tokio::test]
    async fn test_missing_roles_claim_yields_empty_roles() {
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9"})));
        let ctx = header_resolver(&token).get_current().await.unwrap();
        assert!(ctx.roles().is_empty());
    }

    #[tokio::test]
    async fn test_name_identifier_preferred_over_sub() {
        let token = sign(claims(json!({
            "sub": "from-sub",
            "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier": "from-nameid",
            "orgId": "org-9",
        })));
        let ctx = header_resolver(&token).get_current().await.unwrap();
        assert_eq!(ctx.user_id().as_str(), "from-nameid");
    }

    #[tokio::test]
    async fn test_blank_name_identifier_falls_back_to_sub() {
        let token = sign(claims(json!({"nameid": "  ", "sub": "u1", "orgId": "org-9"})));
        let ctx = header_resolver(&token).get_current().await.unwrap();
        assert_eq!(ctx.user_id().as_str(), "u1");
    }

    #[tokio::test]
    async fn test_missing_subject_is_unauthorized() {
        let token = sign(claims(json!({"orgId": "org-9"})));
        let err = header_resolver(&token).get_current().await.unwrap_err();
        assert_eq!(
            err.reason(),
            "missing required claim 'sub' or 'nameidentifier'"
        );
    }

    #[tokio::test]
    async fn test_missing_org_claim_names_the_claim() {
        let token = sign(claims(json!({"sub": "u1", "orgId": " "})));
        let err = header_resolver(&token).get_current().await.unwrap_err();
        assert_eq!(err.reason(), "missing required claim 'orgId'");
        assert_eq!(
            err.to_string(),
            "Unauthorized: missing required claim 'orgId'"
        );
    }

    #[tokio::test]
    async fn test_configured_org_claim_name_is_used() {
        let cfg = JwtConfig {
            org_id_claim: "tenant".into(),
            ..config()
        };
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9"})));
        let source = TokenSource::header();
        source.observe_authorization(Some(&format!("Bearer {}", token)));

        let err = resolver_with(source, &cfg).get_current().await.unwrap_err();
        assert_eq!(err.reason(), "missing required claim 'tenant'");
    }

    #[tokio::test]
    async fn test_expired_token_reason_embeds_classification() {
        let token = sign(claims(json!({
            "sub": "u1",
            "orgId": "org-9",
            "nbf": NOW - 7200,
            "exp": NOW - 600,
        })));
        let err = header_resolver(&token).get_current().await.unwrap_err();
        assert_eq!(err.reason(), "invalid bearer token (token expired)");
        assert!(!err.to_string().contains(&token));
    }

    #[tokio::test]
    async fn test_reason_never_leaks_signing_key() {
        let err = header_resolver("not.a.jwt").get_current().await.unwrap_err();
        assert_eq!(err.reason(), "invalid bearer token (invalid token)");
        assert!(!err.reason().contains("DEV_ONLY"));
    }

    #[tokio::test]
    async fn test_missing_header_names_the_source() {
        let resolver = resolver_with(TokenSource::header(), &config());
        let err = resolver.get_current().await.unwrap_err();
        assert!(err.reason().starts_with("missing bearer token"));
        assert!(err.reason().contains("Authorization"));
    }

    #[tokio::test]
    async fn test_missing_env_var_names_the_source() {
        let source = TokenSource::Env {
            var: "ACME_TEST_RESOLVER_TOKEN_UNSET".into(),
        };
        let err = resolver_with(source, &config())
            .get_current()
            .await
            .unwrap_err();
        assert!(err.reason().starts_with("missing bearer token"));
        assert!(err.reason().contains("ACME_TEST_RESOLVER_TOKEN_UNSET"));
    }

    #[tokio::test]
    async fn test_blank_env_value_is_missing() {
        let var = "ACME_TEST_RESOLVER_TOKEN_BLANK";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(var, "   ") };
        let source = TokenSource::Env { var: var.into() };
        let err = resolver_with(source, &config())
            .get_current()
            .await
            .unwrap_err();
        assert!(err.reason().starts_with("missing bearer token"));
    }

    #[tokio::test]
    async fn test_env_value_with_pasted_bearer_prefix() {
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9", "roles": "Reader"})));
        let plain_var = "ACME_TEST_RESOLVER_TOKEN_PLAIN";
        let prefixed_var = "ACME_TEST_RESOLVER_TOKEN_PREFIXED";
        // SAFETY: the variable names are unique to this test.
        unsafe {
            std::env::set_var(plain_var, &token);
            std::env::set_var(prefixed_var, format!("  Bearer {}  ", token));
        }

        let plain = resolver_with(TokenSource::Env { var: plain_var.into() }, &config())
            .get_current()
            .await
            .unwrap();
        let prefixed = resolver_with(
            TokenSource::Env {
                var: prefixed_var.into(),
            },
            &config(),
        )
        .get_current()
        .await
        .unwrap();

        assert_eq!(plain, prefixed);
    }

    #[tokio::test]
    async fn test_doubled_prefix_in_header_is_tolerated() {
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9"})));
        let source = TokenSource::header();
        source.observe_authorization(Some(&format!("Bearer Bearer {}", token)));
        let ctx = resolver_with(source, &config()).get_current().await.unwrap();
        assert_eq!(ctx.user_id().as_str(), "u1");
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9"})));
        let source = TokenSource::header();
        source.observe_authorization(Some(&format!("Bearer {}", token)));
        let resolver = resolver_with(source.clone(), &config());

        let first = resolver.get_current().await.unwrap();

        // A token that would fail validation is never looked at again.
        source.observe_authorization(Some("Bearer garbage"));
        let second = resolver.get_current().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached_for_later_calls() {
        let source = TokenSource::header();
        let resolver = resolver_with(source.clone(), &config());
        assert!(resolver.get_current().await.is_err());

        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9"})));
        source.observe_authorization(Some(&format!("Bearer {}", token)));
        let ctx = resolver.get_current().await.unwrap();
        assert_eq!(ctx.org_id().as_str(), "org-9");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_share_one_context() {
        let token = sign(claims(json!({"sub": "u1", "orgId": "org-9", "roles": "Reader"})));
        let resolver = Arc::new(header_resolver(&token));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let resolver = resolver.clone();
            tasks.spawn(async move { resolver.get_current().await });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            results.push(joined.unwrap().unwrap());
        }
        assert_eq!(results.len(), 16);
        assert!(results.iter().all(|ctx| *ctx == results[0]));
        assert_eq!(resolver.attempts.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    async fn test_concurrent_failures_are_identical() {
        let resolver = Arc::new(header_resolver("not.a.jwt"));

        // Hold the cache so every caller queues behind the same attempt.
        let guard = resolver.cache.lock().await;
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            tasks.spawn(async move { resolver.get_current().await });
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        drop(guard);

        while let Some(joined) = tasks.join_next().await {
            let err = joined.unwrap().unwrap_err();
            assert_eq!(err.reason(), "invalid bearer token (invalid token)");
        }
        assert_eq!(resolver.attempts.load(Ordering::Acquire), 1);

        // A later, non-racing call validates again.
        assert!(resolver.get_current().await.is_err());
        assert_eq!(resolver.attempts.load(Ordering::Acquire), 2);
    }

    #[test]
    fn test_split_roles() {
        let values = vec!["a,b".to_string(), "".to_string(), " c ".to_string()];
        assert_eq!(split_roles(&values), ["a", "b", "c"]);
        assert!(split_roles(&[]).is_empty());
    }
}
