//! Error types for the sync hub
//!
//! Errors are grouped by where they stop: frame errors are logged and the
//! frame dropped, admission errors prevent a connection from ever existing.
//! Registry operations have no error type at all.

use std::fmt;
use std::io;

use tokio_tungstenite::tungstenite;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure
    Io(io::Error),
    /// Connection could not be admitted
    Admission(AdmissionError),
    /// Owner identity could not be resolved
    Auth(AuthError),
    /// Persistence collaborator failed
    Persist(PersistError),
    /// Inbound or outbound frame could not be processed
    Frame(FrameError),
    /// WebSocket protocol or transport failure
    WebSocket(tungstenite::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Admission(e) => write!(f, "Admission error: {}", e),
            Error::Auth(e) => write!(f, "Auth error: {}", e),
            Error::Persist(e) => write!(f, "Persist error: {}", e),
            Error::Frame(e) => write!(f, "Frame error: {}", e),
            Error::WebSocket(e) => write!(f, "WebSocket error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Admission(e) => Some(e),
            Error::Auth(e) => Some(e),
            Error::Persist(e) => Some(e),
            Error::Frame(e) => Some(e),
            Error::WebSocket(e) => Some(e),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<AdmissionError> for Error {
    fn from(e: AdmissionError) -> Self {
        Error::Admission(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<PersistError> for Error {
    fn from(e: PersistError) -> Self {
        Error::Persist(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        Error::WebSocket(e)
    }
}

/// Reasons an upgrade request never becomes a registered connection
#[derive(Debug)]
pub enum AdmissionError {
    /// Authentication rejected the request; a 401 was returned
    Unauthorized(AuthError),
    /// The WebSocket handshake itself failed
    Handshake(tungstenite::Error),
    /// The handshake did not complete in time
    HandshakeTimeout,
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::Unauthorized(e) => write!(f, "Unauthorized: {}", e),
            AdmissionError::Handshake(e) => write!(f, "Handshake failed: {}", e),
            AdmissionError::HandshakeTimeout => write!(f, "Handshake timed out"),
        }
    }
}

impl std::error::Error for AdmissionError {}

/// Authentication failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token in header or query string
    MissingToken,
    /// Token present but not recognised
    InvalidToken(String),
    /// Token signature valid but expired
    Expired,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing token"),
            AuthError::InvalidToken(reason) => write!(f, "Invalid token: {}", reason),
            AuthError::Expired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Persistence failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// The entry violates a storage constraint
    InvalidEntry(&'static str),
    /// The backend is unavailable or refused the write
    Backend(String),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::InvalidEntry(field) => write!(f, "Invalid entry: {} is required", field),
            PersistError::Backend(msg) => write!(f, "Storage backend error: {}", msg),
        }
    }
}

impl std::error::Error for PersistError {}

/// Per-frame failures; never fatal to a connection
#[derive(Debug)]
pub enum FrameError {
    /// Frame body is not a valid payload
    Decode(serde_json::Error),
    /// A required field is empty or missing
    EmptyField(&'static str),
    /// A stored record could not be encoded
    Encode(serde_json::Error),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Decode(e) => write!(f, "Failed to decode payload: {}", e),
            FrameError::EmptyField(field) => write!(f, "Empty field: {}", field),
            FrameError::Encode(e) => write!(f, "Failed to encode record: {}", e),
        }
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err: Error = AuthError::InvalidToken("bad signature".into()).into();
        assert_eq!(err.to_string(), "Auth error: Invalid token: bad signature");

        let err: Error = PersistError::InvalidEntry("content").into();
        assert_eq!(
            err.to_string(),
            "Persist error: Invalid entry: content is required"
        );

        let err: Error = AdmissionError::Unauthorized(AuthError::MissingToken).into();
        assert_eq!(err.to_string(), "Admission error: Unauthorized: Missing token");
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;

        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "pipe"));
        assert!(err.source().is_some());
    }
}
