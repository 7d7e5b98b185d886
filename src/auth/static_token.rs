//! Fixed token table, for demos and tests

use std::collections::HashMap;

use super::{bearer_token, Authenticator, UpgradeRequest};
use crate::error::AuthError;
use crate::registry::OwnerId;

/// Maps pre-shared tokens to owners
#[derive(Debug, Clone, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, OwnerId>,
}

impl StaticTokenAuthenticator {
    /// Create an empty table; every request is refused
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `owner`
    pub fn with_token(mut self, token: impl Into<String>, owner: OwnerId) -> Self {
        self.tokens.insert(token.into(), owner);
        self
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn resolve_owner(&self, request: &UpgradeRequest) -> Result<OwnerId, AuthError> {
        let token = bearer_token(request).ok_or(AuthError::MissingToken)?;
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| AuthError::InvalidToken("unknown token".into()))
    }
}

#[cfg(test)]
mod tests {
    use tokio_tungstenite::tungstenite::handshake::server::Request;

    use super::*;

    #[test]
    fn test_resolves_known_tokens() {
        let auth = StaticTokenAuthenticator::new()
            .with_token("alice-token", OwnerId::new(1))
            .with_token("bob-token", OwnerId::new(2));

        let req = Request::builder()
            .uri("/ws?token=bob-token")
            .body(())
            .unwrap();
        assert_eq!(auth.resolve_owner(&req), Ok(OwnerId::new(2)));
    }

    #[test]
    fn test_rejects_unknown_and_missing() {
        let auth = StaticTokenAuthenticator::new().with_token("alice-token", OwnerId::new(1));

        let req = Request::builder().uri("/ws?token=nope").body(()).unwrap();
        assert!(matches!(
            auth.resolve_owner(&req),
            Err(AuthError::InvalidToken(_))
        ));

        let req = Request::builder().uri("/ws").body(()).unwrap();
        assert_eq!(auth.resolve_owner(&req), Err(AuthError::MissingToken));
    }
}
