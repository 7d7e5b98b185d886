//! Classification of transport shutdowns
//!
//! Clients vanish all the time (laptop lid closed, tab closed, network
//! switch). Those are ordinary disconnects and are logged at debug level;
//! anything else is worth a warning.

use std::io;

use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Error as WsError;

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Normal, going-away or abnormal (dropped) closure
    Ordinary,
    /// Protocol violation, policy close or unexpected I/O failure
    Unexpected,
}

impl Disconnect {
    /// Whether this disconnect deserves a warning
    pub fn is_unexpected(self) -> bool {
        self == Disconnect::Unexpected
    }
}

/// Classify a close frame received from the peer
pub fn classify_close(frame: Option<&CloseFrame>) -> Disconnect {
    match frame.map(|f| f.code) {
        None | Some(CloseCode::Normal) | Some(CloseCode::Away) | Some(CloseCode::Abnormal) => {
            Disconnect::Ordinary
        }
        Some(_) => Disconnect::Unexpected,
    }
}

/// Classify a read error
pub fn classify_error(err: &WsError) -> Disconnect {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => Disconnect::Ordinary,
        WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => Disconnect::Ordinary,
        WsError::Io(e) => match e.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Disconnect::Ordinary,
            _ => Disconnect::Unexpected,
        },
        _ => Disconnect::Unexpected,
    }
}

/// Close frame sent when the hub ends a connection
pub fn normal_close() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    }
}
