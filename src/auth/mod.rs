//! Caller authentication and context resolution.
//!
//! A single caller identity is authenticated per process (STDIO) or per MCP
//! session (HTTP) from a bearer JWT:
//!
//! - **TokenSource**: where the raw token comes from (`MCP_BEARER_TOKEN` or
//!   the inbound `Authorization` header)
//! - **TokenValidator**: HMAC signature, issuer, audience and lifetime checks
//! - **CallerContextResolver**: claim extraction and session caching
//!
//! ## Security Model
//!
//! - Tools ask the resolver for the caller before doing any work
//! - Every failure surfaces as one `Unauthorized` reason; tokens and keys are
//!   never logged or returned
//! - Role claims are surfaced, not enforced
//!
//! ## Usage
//!
//! ```ignore
//! let validator = Arc::new(TokenValidator::new(&config.jwt));
//! let resolver = CallerContextResolver::new(TokenSource::env(), validator, &config.jwt);
//!
//! let caller = resolver.get_current().await?;
//! tracing::info!(user_id = %caller.user_id(), "serving request");
//! ```

mod context;
pub mod mint;
mod resolver;
mod token_source;
mod validator;

pub use context::CallerContext;
pub use mint::{MintRequest, TokenMinter};
pub use resolver::{CallerContextResolver, Unauthorized};
pub use token_source::{
    BEARER_TOKEN_ENV, HeaderSlot, TokenSource, normalize_bearer, strip_bearer_prefix,
};
pub use validator::{CLOCK_SKEW_SECONDS, ClaimSet, Clock, TokenValidator, ValidationError};
