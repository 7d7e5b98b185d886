//! Connection admission
//!
//! Upgrades a raw stream to a WebSocket, resolving the owner inside the
//! handshake so an unauthenticated request is refused with 401 before any
//! connection exists. An admitted connection is registered, then its pumps
//! are started.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;

use crate::auth::Authenticator;
use crate::error::{AdmissionError, AuthError};
use crate::persist::EntryStore;
use crate::registry::{ConnectionId, OwnerId, Registry};
use crate::server::config::ServerConfig;
use crate::server::pump::{inbound_pump, outbound_pump};
use crate::session::{ConnectionContext, ConnectionState};

/// Turns accepted streams into registered, running connections
pub struct Admission<A: Authenticator, S: EntryStore> {
    registry: Arc<Registry>,
    auth: Arc<A>,
    store: Arc<S>,
    config: ServerConfig,
    next_conn_id: AtomicU64,
}

/// A connection that passed admission
#[derive(Debug)]
pub struct AdmittedConnection {
    /// Identity of the connection
    pub context: ConnectionContext,
    /// Shared lifecycle
    pub state: Arc<ConnectionState>,
    inbound: JoinHandle<()>,
    outbound: JoinHandle<()>,
}

impl AdmittedConnection {
    /// Wait until both pumps have finished
    pub async fn closed(self) {
        let _ = self.inbound.await;
        let _ = self.outbound.await;
    }
}

impl<A: Authenticator, S: EntryStore> Admission<A, S> {
    /// Create an admission stage
    pub fn new(registry: Arc<Registry>, auth: Arc<A>, store: Arc<S>, config: ServerConfig) -> Self {
        Self {
            registry,
            auth,
            store,
            config,
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Registry connections are admitted into
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Upgrade, authenticate, register and start the pumps
    pub async fn admit<T>(
        &self,
        stream: T,
        peer_addr: SocketAddr,
    ) -> Result<AdmittedConnection, AdmissionError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut owner: Option<OwnerId> = None;
        let mut rejection: Option<AuthError> = None;

        let auth = self.auth.as_ref();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            match auth.resolve_owner(request) {
                Ok(id) => {
                    owner = Some(id);
                    Ok(response)
                }
                Err(e) => {
                    let mut refusal = ErrorResponse::new(Some(e.to_string()));
                    *refusal.status_mut() = StatusCode::UNAUTHORIZED;
                    rejection = Some(e);
                    Err(refusal)
                }
            }
        };

        let handshake = accept_hdr_async_with_config(
            stream,
            callback,
            Some(self.config.websocket_config()),
        );
        let upgraded = tokio::time::timeout(self.config.handshake_timeout, handshake)
            .await
            .map_err(|_| AdmissionError::HandshakeTimeout)?;

        let ws = match upgraded {
            Ok(ws) => ws,
            Err(e) => {
                return Err(match rejection {
                    Some(reason) => AdmissionError::Unauthorized(reason),
                    None => AdmissionError::Handshake(e),
                });
            }
        };
        let Some(owner) = owner else {
            return Err(AdmissionError::Unauthorized(AuthError::MissingToken));
        };

        let conn_id = ConnectionId::new(self.next_conn_id.fetch_add(1, Ordering::Relaxed));
        let context = ConnectionContext::new(conn_id, owner, peer_addr);
        let state = Arc::new(ConnectionState::new());

        let (mailbox, receiver) = self.registry.open_mailbox(&state);
        self.registry.register(&context, mailbox).await;
        state.mark_registered();

        let (writer, reader) = ws.split();

        let inbound = tokio::spawn(inbound_pump(
            context.clone(),
            Arc::clone(&state),
            reader,
            Arc::clone(&self.registry),
            Arc::clone(&self.store),
            self.config.idle_timeout,
        ));
        let outbound = tokio::spawn(outbound_pump(
            context.clone(),
            Arc::clone(&state),
            receiver,
            writer,
            Arc::clone(&self.registry),
            self.config.ping_interval,
        ));
        state.mark_active();

        Ok(AdmittedConnection {
            context,
            state,
            inbound,
            outbound,
        })
    }
}
