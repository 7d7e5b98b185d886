//! HS256 JWT authentication
//!
//! Tokens carry the owner in a `user_id` claim and expire after 24 hours by
//! default.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{bearer_token, Authenticator, UpgradeRequest};
use crate::error::AuthError;
use crate::registry::OwnerId;

/// Default token lifetime
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub user_id: u64,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies (and issues) HS256 tokens signed with a shared secret
pub struct JwtAuthenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuthenticator {
    /// Create an authenticator for the given signing secret
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl: DEFAULT_TOKEN_TTL,
        }
    }

    /// Set the lifetime of issued tokens
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token for `owner`
    pub fn issue_token(&self, owner: OwnerId) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id: owner.get(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Verify a raw token string
    pub fn verify(&self, token: &str) -> Result<OwnerId, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        Ok(OwnerId::new(data.claims.user_id))
    }
}

impl Authenticator for JwtAuthenticator {
    fn resolve_owner(&self, request: &UpgradeRequest) -> Result<OwnerId, AuthError> {
        let token = bearer_token(request).ok_or(AuthError::MissingToken)?;
        self.verify(token)
    }
}
