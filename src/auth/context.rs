//! Caller context for session-scoped identity.

use crate::types::{OrgId, UserId};
use serde::Serialize;

/// The authenticated caller, derived from a validated bearer token.
///
/// Only the resolver constructs this, after validation and claim extraction
/// have both succeeded. It is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerContext {
    user_id: UserId,
    org_id: OrgId,
    /// Roles in claim emission order, not deduplicated.
    roles: Vec<String>,
}

impl CallerContext {
    pub(crate) fn new(user_id: UserId, org_id: OrgId, roles: Vec<String>) -> Self {
        Self {
            user_id,
            org_id,
            roles,
        }
    }

    /// Get the caller's user ID.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Get the caller's organization ID.
    pub fn org_id(&self) -> &OrgId {
        &self.org_id
    }

    /// Get the caller's roles.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CallerContext {
        CallerContext::new(
            UserId::new("u1"),
            OrgId::new("org-9"),
            vec!["Reader".to_string(), "Writer".to_string()],
        )
    }

    #[test]
    fn test_caller_context_accessors() {
        let ctx = sample();
        assert_eq!(ctx.user_id().as_str(), "u1");
        assert_eq!(ctx.org_id().as_str(), "org-9");
        assert_eq!(ctx.roles(), ["Reader", "Writer"]);
    }

    #[test]
    fn test_caller_context_serializes_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["orgId"], "org-9");
        assert_eq!(json["roles"][1], "Writer");
    }
}
