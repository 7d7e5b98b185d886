//! Sync server listener
//!
//! Handles the TCP accept loop and spawns one admission task per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::auth::Authenticator;
use crate::error::{AdmissionError, Result};
use crate::persist::EntryStore;
use crate::registry::{Registry, RegistryConfig};
use crate::server::admission::Admission;
use crate::server::config::ServerConfig;
use crate::stats::{HubStats, HubStatsSnapshot};

/// Clipboard sync server
pub struct SyncServer<A: Authenticator, S: EntryStore> {
    config: ServerConfig,
    admission: Arc<Admission<A, S>>,
    stats: Arc<HubStats>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<A: Authenticator, S: EntryStore> SyncServer<A, S> {
    /// Create a new server with the given configuration and collaborators
    pub fn new(config: ServerConfig, auth: A, store: S) -> Self {
        Self::with_registry_config(config, auth, store, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        auth: A,
        store: S,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let stats = Arc::new(HubStats::new());
        let registry = Arc::new(Registry::with_stats(registry_config, Arc::clone(&stats)));
        let admission = Admission::new(registry, Arc::new(auth), Arc::new(store), config.clone());

        Self {
            config,
            admission: Arc::new(admission),
            stats,
            connection_semaphore,
        }
    }

    /// Get a reference to the connection registry
    pub fn registry(&self) -> &Arc<Registry> {
        self.admission.registry()
    }

    /// Current hub counters
    pub fn stats(&self) -> HubStatsSnapshot {
        self.stats.snapshot()
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Sync server listening");
        Ok(listener)
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    /// Accept connections from an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit: Option<OwnedSemaphorePermit> = match self.connection_semaphore {
            Some(ref sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        tracing::debug!(peer = %peer_addr, "New connection");

        // Configure socket
        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let admission = Arc::clone(&self.admission);

        tokio::spawn(async move {
            // Held until both pumps finish
            let _permit = permit;

            match admission.admit(socket, peer_addr).await {
                Ok(connection) => connection.closed().await,
                Err(AdmissionError::Unauthorized(e)) => {
                    tracing::info!(peer = %peer_addr, reason = %e, "Upgrade refused");
                }
                Err(e) => {
                    tracing::debug!(peer = %peer_addr, error = %e, "Admission failed");
                }
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
