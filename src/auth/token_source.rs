//! Where the raw bearer credential comes from.
//!
//! The variant is picked once at startup: STDIO sessions read an environment
//! variable, HTTP sessions read the `Authorization` header of the current
//! inbound request.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Environment variable carrying the bearer token in STDIO mode.
pub const BEARER_TOKEN_ENV: &str = "MCP_BEARER_TOKEN";

const BEARER_PREFIX: &str = "Bearer ";

/// Source of the raw bearer token for a process or session.
#[derive(Clone, Debug)]
pub enum TokenSource {
    /// Read a fixed environment variable on every call.
    Env { var: String },
    /// Read the `Authorization` header captured from the current request.
    Header(HeaderSlot),
}

impl TokenSource {
    /// Environment source reading [`BEARER_TOKEN_ENV`].
    pub fn env() -> Self {
        Self::Env {
            var: BEARER_TOKEN_ENV.to_string(),
        }
    }

    /// Header source with an empty slot.
    pub fn header() -> Self {
        Self::Header(HeaderSlot::default())
    }

    /// Current raw token, if any. Never fails; absence is `None`.
    ///
    /// The environment variant returns the variable as-is (it may still
    /// carry a pasted `Bearer ` prefix). The header variant returns the
    /// trimmed value after a case-insensitive `Bearer ` prefix, or `None`
    /// when the header is missing or uses another scheme.
    pub fn get_token(&self) -> Option<String> {
        match self {
            Self::Env { var } => std::env::var(var).ok(),
            Self::Header(slot) => slot
                .authorization()
                .and_then(|value| strip_bearer_prefix(&value).map(|t| t.trim().to_string())),
        }
    }

    /// Human-readable description of where the token is expected.
    pub fn describe(&self) -> String {
        match self {
            Self::Env { var } => format!("set env var '{}' to a JWT", var),
            Self::Header(_) => {
                "send an 'Authorization: Bearer <token>' header with the request".to_string()
            }
        }
    }

    /// Record the `Authorization` header of the request being served.
    ///
    /// No-op for the environment variant.
    pub fn observe_authorization(&self, value: Option<&str>) {
        if let Self::Header(slot) = self {
            slot.set(value);
        }
    }
}

/// Shared slot holding the latest inbound `Authorization` header value.
#[derive(Clone, Default)]
pub struct HeaderSlot(Arc<RwLock<Option<String>>>);

impl HeaderSlot {
    pub fn set(&self, value: Option<&str>) {
        let mut guard = self.0.write().unwrap_or_else(PoisonError::into_inner);
        *guard = value.map(str::to_string);
    }

    pub fn authorization(&self) -> Option<String> {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for HeaderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = self.authorization().is_some();
        f.debug_struct("HeaderSlot")
            .field("present", &present)
            .finish()
    }
}

/// Return the remainder after a case-insensitive `Bearer ` prefix.
pub fn strip_bearer_prefix(value: &str) -> Option<&str> {
    let head = value.get(..BEARER_PREFIX.len())?;
    if head.eq_ignore_ascii_case(BEARER_PREFIX) {
        Some(&value[BEARER_PREFIX.len()..])
    } else {
        None
    }
}

/// Trim a raw token and drop one pasted `Bearer ` prefix, if present.
pub fn normalize_bearer(raw: &str) -> &str {
    let trimmed = raw.trim();
    match strip_bearer_prefix(trimmed) {
        Some(rest) => rest.trim(),
        None => trimmed,
    }
}
