//! Outbound bearer credential propagation.

use crate::auth::{TokenSource, normalize_bearer};

/// Attaches the session's raw bearer token to outbound internal API calls.
///
/// Pure pass-through: it reads the token source directly and never asks the
/// resolver, so validation failures only surface where tools ask for the
/// caller. A missing token yields an unauthenticated request; the internal
/// API is the one that rejects it.
#[derive(Clone, Debug)]
pub struct CredentialForwarder {
    source: TokenSource,
}

impl CredentialForwarder {
    pub fn new(source: TokenSource) -> Self {
        Self { source }
    }

    /// Current token with any pasted `Bearer ` prefix removed, if non-blank.
    pub fn bearer_token(&self) -> Option<String> {
        let raw = self.source.get_token()?;
        let token = normalize_bearer(&raw);
        (!token.is_empty()).then(|| token.to_string())
    }

    pub fn attach(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
