//! NewType wrappers for strong typing of caller identity.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing an organization ID where a user ID is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

newtype_string!(
    /// Caller identifier taken from the token's subject or name-identifier
    /// claim.
    UserId
);

newtype_string!(
    /// Organization the caller belongs to, taken from the configured
    /// organization claim.
    OrgId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newtype_display_and_eq() {
        let user = UserId::new("u1");
        assert_eq!(user.to_string(), "u1");
        assert_eq!(user, "u1");
        assert_eq!(user.as_str(), "u1");

        let org: OrgId = "org-9".into();
        assert_eq!(org.clone().into_inner(), "org-9".to_string());
    }

    #[test]
    fn test_newtype_serializes_transparently() {
        let org = OrgId::new("org-abc");
        let json = serde_json::to_string(&org).unwrap();
        assert_eq!(json, "\"org-abc\"");
    }
}
