//! Authentication collaborator
//!
//! Resolves an upgrade request to an owner identity before the WebSocket
//! handshake completes. Resolution runs inside the handshake callback, so it
//! is synchronous; token verification is CPU-only.

pub mod jwt;
pub mod static_token;

pub use jwt::JwtAuthenticator;
pub use static_token::StaticTokenAuthenticator;

use tokio_tungstenite::tungstenite::handshake::server::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

use crate::error::AuthError;
use crate::registry::OwnerId;

/// HTTP request asking to upgrade to a WebSocket
pub type UpgradeRequest = Request;

/// Resolves the owner of an upgrade request
pub trait Authenticator: Send + Sync + 'static {
    /// Resolve the owner identity, or refuse the upgrade
    fn resolve_owner(&self, request: &UpgradeRequest) -> Result<OwnerId, AuthError>;
}

/// Extract a bearer token from the request
///
/// Checks `Authorization: Bearer <token>` first, then a `token` query
/// parameter (browsers cannot set headers on WebSocket upgrades).
pub fn bearer_token(request: &UpgradeRequest) -> Option<&str> {
    let from_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            let (scheme, token) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
        .filter(|token| !token.is_empty());

    from_header.or_else(|| {
        request
            .uri()
            .query()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
            .filter(|token| !token.is_empty())
    })
}
