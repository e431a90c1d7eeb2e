//! Development token minting.
//!
//! Signs HS256 tokens with the same issuer, audience and shared secret the
//! server validates against, so a local setup can be exercised end to end.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};

use crate::config::JwtConfig;

/// Default token lifetime for minted tokens.
pub const DEFAULT_LIFETIME_MINUTES: i64 = 60;

/// Identity to embed in a minted token.
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub user_id: String,
    pub org_id: String,
    pub roles: Vec<String>,
    pub lifetime: Duration,
}

impl MintRequest {
    pub fn new(user_id: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            org_id: org_id.into(),
            roles: Vec::new(),
            lifetime: Duration::minutes(DEFAULT_LIFETIME_MINUTES),
        }
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = roles;
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }
}

/// Signs tokens for the configured issuer and audience.
pub struct TokenMinter {
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
    org_id_claim: String,
    roles_claim: String,
}

impl TokenMinter {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.signing_key.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            org_id_claim: config.org_id_claim.clone(),
            roles_claim: config.roles_claim.clone(),
        }
    }

    /// Mint a token for the given identity, valid from one minute ago.
    pub fn mint(&self, request: &MintRequest) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".into(), json!(self.issuer));
        claims.insert("aud".into(), json!(self.audience));
        claims.insert("sub".into(), json!(request.user_id));
        claims.insert(self.org_id_claim.clone(), json!(request.org_id));
        match request.roles.as_slice() {
            [] => {}
            [single] => {
                claims.insert(self.roles_claim.clone(), json!(single));
            }
            many => {
                claims.insert(self.roles_claim.clone(), json!(many));
            }
        }
        claims.insert("iat".into(), json!(now.timestamp()));
        claims.insert("nbf".into(), json!((now - Duration::minutes(1)).timestamp()));
        claims.insert("exp".into(), json!((now + request.lifetime).timestamp()));

        self.sign(&Value::Object(claims))
    }

    /// Sign an arbitrary claim payload with HS256.
    pub fn sign(&self, claims: &Value) -> Result<String, jsonwebtoken::errors::Error> {
        self.sign_with(Algorithm::HS256, claims)
    }

    pub fn sign_with(
        &self,
        algorithm: Algorithm,
        claims: &Value,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(algorithm), claims, &self.encoding_key)
    }
}
