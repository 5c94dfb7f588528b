use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::principal::{Permission, Principal, Role};
use crate::config::SecurityConfig;

/// Signed claim bundle carried by every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default, rename = "organizationId")]
    pub organization_id: Option<String>,
    pub permissions: BTreeSet<Permission>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    fn new(principal: &Principal, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: principal.subject_id.clone(),
            email: principal.email.clone(),
            role: principal.role,
            organization_id: principal.organization_id.clone(),
            permissions: principal.permissions.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal {
            subject_id: self.sub.clone(),
            email: self.email.clone(),
            role: self.role,
            organization_id: self.organization_id.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::SignatureInvalid,
            _ => TokenError::Malformed,
        }
    }
}

/// Collaborator consulted after a token's signature and expiry check out.
pub trait RevocationCheck: Send + Sync {
    fn is_revoked(&self, jti: &str) -> bool;
}

/// In-process revocation list keyed by token id. Entries are kept until the
/// token would have expired anyway.
#[derive(Debug, Default)]
pub struct RevocationList {
    revoked: RwLock<HashMap<String, i64>>,
}

impl RevocationList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revoke(&self, jti: &str, exp: i64) {
        let mut revoked = self.revoked.write().unwrap_or_else(|e| e.into_inner());
        let now = Utc::now().timestamp();
        revoked.retain(|_, until| *until >= now);
        revoked.insert(jti.to_string(), exp);
    }

    pub fn len(&self) -> usize {
        self.revoked.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RevocationCheck for RevocationList {
    fn is_revoked(&self, jti: &str) -> bool {
        self.revoked
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(jti)
    }
}

/// HS256 token codec over a process-wide secret.
///
/// Signature verification goes through `jsonwebtoken`'s HMAC verify, which
/// compares tags in constant time.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
    revocations: Option<Arc<dyn RevocationCheck>>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("ttl", &self.ttl)
            .field("revocations", &self.revocations.is_some())
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Signing("JWT secret not configured".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            revocations: None,
        })
    }

    pub fn from_config(security: &SecurityConfig) -> Result<Self, TokenError> {
        Self::new(&security.jwt_secret, Duration::seconds(security.token_ttl_secs as i64))
    }

    pub fn with_revocation(mut self, check: Arc<dyn RevocationCheck>) -> Self {
        self.revocations = Some(check);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_with_ttl(principal, self.ttl)
    }

    pub fn issue_with_ttl(&self, principal: &Principal, ttl: Duration) -> Result<String, TokenError> {
        if !principal.is_well_formed() {
            return Err(TokenError::Signing(format!(
                "role '{}' is inconsistent with its organization binding",
                principal.role
            )));
        }

        let claims = Claims::new(principal, ttl);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify signature, expiry and structure, then consult the revocation list.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        let claims = data.claims;

        if !claims.principal().is_well_formed() {
            tracing::warn!("Rejecting token {} with inconsistent role/organization claims", claims.jti);
            return Err(TokenError::Malformed);
        }

        if let Some(revocations) = &self.revocations {
            if revocations.is_revoked(&claims.jti) {
                return Err(TokenError::Revoked);
            }
        }

        Ok(claims)
    }
}

/// Pull the bearer credential out of an `Authorization` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
