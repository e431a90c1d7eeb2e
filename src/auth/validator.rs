//! Bearer token validation.
//!
//! Tokens are HMAC-signed JWTs checked against the configured issuer,
//! audience and shared secret. Lifetime is checked against an injectable
//! [`Clock`] with a fixed two minute skew tolerance, so validation is
//! deterministic in tests.

use std::collections::BTreeMap;
use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};

use crate::config::JwtConfig;

/// Allowed clock difference between issuer and validator, in seconds.
pub const CLOCK_SKEW_SECONDS: i64 = 120;

/// Time source for lifetime checks (Unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(i64),
}

impl Clock {
    pub fn now(&self) -> i64 {
        match self {
            Self::System => chrono::Utc::now().timestamp(),
            Self::Fixed(ts) => *ts,
        }
    }
}

/// Why a token was rejected. Exactly one classification per failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Bad encoding, missing segments, unsupported algorithm, missing `exp`.
    MalformedToken,
    InvalidSignature,
    InvalidIssuer { expected: String },
    InvalidAudience { expected: String },
    TokenExpired,
    TokenNotYetValid,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedToken => write!(f, "invalid token"),
            Self::InvalidSignature => write!(f, "invalid signature (signing key mismatch?)"),
            Self::InvalidIssuer { expected } => {
                write!(f, "invalid issuer (expected '{}')", expected)
            }
            Self::InvalidAudience { expected } => {
                write!(f, "invalid audience (expected '{}')", expected)
            }
            Self::TokenExpired => write!(f, "token expired"),
            Self::TokenNotYetValid => write!(f, "token not yet valid"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Decoded claims: claim name to one or more string values.
///
/// JSON arrays become repeated values in array order; numbers and booleans
/// are stringified; nulls are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet(BTreeMap<String, Vec<String>>);

impl ClaimSet {
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let mut claims = BTreeMap::new();
        for (name, value) in payload {
            let mut values = Vec::new();
            flatten_claim(value, &mut values);
            if !values.is_empty() {
                claims.insert(name, values);
            }
        }
        Self(claims)
    }

    /// First value of a claim, if present.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of a claim, in emission order.
    pub fn all(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

fn flatten_claim(value: Value, out: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push(s),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Array(_) => out.push(item.to_string()),
                    other => flatten_claim(other, out),
                }
            }
        }
        other => out.push(other.to_string()),
    }
}

/// Validates bearer tokens against the configured issuer, audience and key.
///
/// Stateless apart from configuration; safe to share behind an `Arc`.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    clock: Clock,
}

impl TokenValidator {
    pub fn new(config: &JwtConfig) -> Self {
        Self::with_clock(config, Clock::System)
    }

    pub fn with_clock(config: &JwtConfig, clock: Clock) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_required_spec_claims(&["exp"]);
        // Only the signature is checked by `decode`; lifetime, audience and
        // issuer follow in that order in `validate`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(config.signing_key.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            clock,
        }
    }

    /// Validate a token and return its full claim set.
    ///
    /// Checks run signature, lifetime, audience, issuer; the first failure
    /// is the one reported.
    pub fn validate(&self, token: &str) -> Result<ClaimSet, ValidationError> {
        let data = decode::<Map<String, Value>>(token, &self.decoding_key, &self.validation)
            .map_err(|e| Self::classify(e.kind()))?;

        let payload = data.claims;
        self.check_lifetime(&payload)?;

        let claims = ClaimSet::from_payload(payload);
        if !claims.all("aud").iter().any(|aud| *aud == self.audience) {
            return Err(self.invalid_audience());
        }
        if claims.first("iss") != Some(self.issuer.as_str()) {
            return Err(self.invalid_issuer());
        }

        Ok(claims)
    }

    fn check_lifetime(&self, payload: &Map<String, Value>) -> Result<(), ValidationError> {
        let now = self.clock.now();
        let exp = numeric_date(payload.get("exp")).ok_or(ValidationError::MalformedToken)?;
        let nbf = match payload.get("nbf") {
            None | Some(Value::Null) => None,
            Some(v) => Some(numeric_date(Some(v)).ok_or(ValidationError::MalformedToken)?),
        };

        if let Some(nbf) = nbf
            && nbf > exp
        {
            return Err(ValidationError::MalformedToken);
        }
        if let Some(nbf) = nbf
            && nbf > now + CLOCK_SKEW_SECONDS
        {
            return Err(ValidationError::TokenNotYetValid);
        }
        if exp < now - CLOCK_SKEW_SECONDS {
            return Err(ValidationError::TokenExpired);
        }
        Ok(())
    }

    fn classify(kind: &ErrorKind) -> ValidationError {
        match kind {
            ErrorKind::InvalidSignature => ValidationError::InvalidSignature,
            _ => ValidationError::MalformedToken,
        }
    }

    fn invalid_issuer(&self) -> ValidationError {
        ValidationError::InvalidIssuer {
            expected: self.issuer.clone(),
        }
    }

    fn invalid_audience(&self) -> ValidationError {
        ValidationError::InvalidAudience {
            expected: self.audience.clone(),
        }
    }
}

fn numeric_date(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
}
