// ============================================
// File: crates/sealpost-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Main server implementation that wires the services together, accepts
//! WebSocket connections and manages the server lifecycle.
//!
//! ## Main Functionality
//! - `Server`: Main server struct and lifecycle management
//! - Service initialization and wiring
//! - Accept loop with a connection limit
//! - Graceful shutdown handling
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                   Accept Task                        │   │
//! │  │   TcpListener ──► WebSocket upgrade ──► spawn        │   │
//! │  │                                                      │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐    │   │
//! │  │   │Connection 1│  │Connection 2│  │Connection N│    │   │
//! │  │   └─────┬──────┘  └─────┬──────┘  └─────┬──────┘    │   │
//! │  │         └───────────────┼───────────────┘           │   │
//! │  │                         ▼                           │   │
//! │  │                ConnectionHandler                     │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                    Services                          │   │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐  │   │
//! │  │  │  Relay   │ │ Presence │ │  Token   │ │Storage │  │   │
//! │  │  │  Router  │ │ Tracker  │ │  Auth    │ │        │  │   │
//! │  │  └──────────┘ └──────────┘ └──────────┘ └────────┘  │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Graceful shutdown waits up to 5 seconds for connections to close
//! - Sockets above `max_connections` are dropped before the upgrade
//! - All services are Arc-wrapped for sharing
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use sealpost_transport::ws;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handlers::{ConnectionHandler, ConnectionLimits};
use crate::services::{open_storage, PresenceTracker, RelayRouter, Storage, TokenAuthenticator};

/// How long shutdown waits for open connections.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================
// Server
// ============================================

/// Main sealpost relay server.
///
/// # Lifecycle
/// 1. Create with `Server::new(config)`
/// 2. Start with `server.run().await`
/// 3. Shutdown via `shutdown()` or Ctrl+C
pub struct Server {
    /// Server configuration.
    config: ServerConfig,
    /// Pre-opened storage, otherwise opened from config.
    storage: Option<Arc<dyn Storage>>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Creates a new server instance.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            storage: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Creates a server over an already opened storage backend.
    #[must_use]
    pub fn with_storage(config: ServerConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            storage: Some(storage),
            ..Self::new(config)
        }
    }

    /// Binds the configured address and runs until shutdown.
    ///
    /// # Errors
    /// Returns error if the server fails to start.
    pub async fn run(&self) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::startup_failed(format!("bind {addr} failed: {e}")))?;
        self.run_with_listener(listener).await
    }

    /// Runs on an already bound listener until shutdown.
    ///
    /// # Errors
    /// Returns error if services fail to initialize.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        info!("Starting sealpost relay v{}", env!("CARGO_PKG_VERSION"));

        let router = self.init_services().await?;
        let handler = ConnectionHandler::new(
            router,
            ConnectionLimits {
                handshake_timeout: self.config.limits.handshake_timeout(),
                idle_timeout: self.config.limits.idle_timeout(),
                max_frame_bytes: self.config.limits.max_frame_bytes,
            },
        );

        let local_addr = listener.local_addr()?;
        info!("WebSocket relay listening on {}", local_addr);

        let accept_task = self.spawn_accept_task(listener, handler);

        info!("Server started successfully");

        // Wait for shutdown signal
        self.wait_for_shutdown().await;

        info!("Shutting down server...");
        self.shutdown();

        match accept_task.await {
            Ok(mut connections) => {
                let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
                    while let Some(done) = connections.join_next().await {
                        if let Err(e) = done {
                            warn!("Connection task failed: {}", e);
                        }
                    }
                })
                .await;
                if drained.is_err() {
                    warn!(remaining = connections.len(), "Connections timed out during shutdown");
                    connections.abort_all();
                }
            }
            Err(e) => warn!("Accept task failed: {}", e),
        }

        info!("Server shutdown complete");
        Ok(())
    }

    /// Initializes storage, authentication, presence and the router.
    async fn init_services(&self) -> Result<Arc<RelayRouter>> {
        let storage = match &self.storage {
            Some(storage) => Arc::clone(storage),
            None => open_storage(&self.config.storage).await?,
        };

        let authenticator = Arc::new(TokenAuthenticator::from_config(
            &self.config.auth,
            Arc::clone(&storage),
        ));
        let presence = Arc::new(PresenceTracker::new(self.config.presence.event_capacity));
        let router = RelayRouter::open(storage, authenticator, presence).await?;

        info!(
            "Services initialized: max connections={}, max frame={} bytes",
            self.config.limits.max_connections, self.config.limits.max_frame_bytes
        );

        Ok(Arc::new(router))
    }

    /// Spawns the accept loop. Resolves to the set of still-running
    /// connection tasks once shutdown is signalled.
    fn spawn_accept_task(
        &self,
        listener: TcpListener,
        handler: ConnectionHandler,
    ) -> JoinHandle<JoinSet<()>> {
        let shutdown = Arc::clone(&self.shutdown);
        let shutdown_tx = self.shutdown_tx.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let slots = Arc::new(Semaphore::new(self.config.limits.max_connections));

        tokio::spawn(async move {
            let mut connections = JoinSet::new();

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Accept task received shutdown signal");
                        break;
                    }
                    Some(done) = connections.join_next(), if !connections.is_empty() => {
                        if let Err(e) = done {
                            warn!("Connection task failed: {}", e);
                        }
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                if shutdown.load(Ordering::SeqCst) {
                                    break;
                                }
                                let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
                                    warn!(peer = %peer, "Connection limit reached, dropping socket");
                                    continue;
                                };
                                let handler = handler.clone();
                                let conn_shutdown = shutdown_tx.subscribe();
                                connections.spawn(async move {
                                    let _permit = permit;
                                    serve_socket(handler, stream, peer, conn_shutdown).await;
                                });
                            }
                            Err(e) => {
                                if !shutdown.load(Ordering::SeqCst) {
                                    error!("Accept error: {}", e);
                                }
                            }
                        }
                    }
                }
            }

            debug!("Accept task exiting");
            connections
        })
    }

    /// Waits for shutdown signal (Ctrl+C or programmatic).
    async fn wait_for_shutdown(&self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if self.shutdown.load(Ordering::SeqCst) {
            return;
        }

        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            () = ctrl_c => info!("Received shutdown signal"),
            _ = shutdown_rx.recv() => info!("Shutdown requested"),
        }
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }
}

/// Upgrades one socket and runs the connection.
async fn serve_socket(
    handler: ConnectionHandler,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: broadcast::Receiver<()>,
) {
    let _ = stream.set_nodelay(true);
    match ws::accept(stream).await {
        Ok((sink, source)) => {
            debug!(peer = %peer, "WebSocket upgraded");
            if let Err(e) = handler.run(source, sink, shutdown).await {
                debug!(peer = %peer, error = %e, "Connection ended with error");
            }
        }
        Err(e) => debug!(peer = %peer, error = %e, "WebSocket upgrade failed"),
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.network.listen_addr)
            .field("storage", &self.config.storage.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_core::crypto::IdentityKeyPair;
    use sealpost_core::protocol::{ClientFrame, FrameCodec, ServerFrame};
    use sealpost_transport::{FrameSink, FrameSource};

    use crate::services::{MemoryStorage, NewUser};

    async fn start(max_connections: usize) -> (Arc<Server>, SocketAddr, String, JoinHandle<Result<()>>) {
        let mut config = ServerConfig::default();
        config.auth.token_secret = Some("k".repeat(32));
        config.limits.max_connections = max_connections;

        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let user = storage
            .create_user(NewUser {
                username: "alice".into(),
                public_key: IdentityKeyPair::generate().public_key(),
                is_admin: false,
            })
            .await
            .unwrap();
        let token = TokenAuthenticator::from_config(&config.auth, Arc::clone(&storage))
            .issue(&user)
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::with_storage(config, storage));
        let task = tokio::spawn({
            let server = Arc::clone(&server);
            async move { server.run_with_listener(listener).await }
        });
        (server, addr, token, task)
    }

    #[tokio::test]
    async fn test_websocket_session_and_shutdown() {
        let (server, addr, token, task) = start(16).await;
        let codec = FrameCodec::default();

        let (mut sink, mut source) = ws::connect(&format!("ws://{addr}")).await.unwrap();
        sink.send(codec.encode(&ClientFrame::Auth { token }).unwrap()).await.unwrap();

        let first = source.recv().await.unwrap().unwrap();
        assert!(matches!(
            codec.decode_server(&first).unwrap(),
            ServerFrame::Authenticated { .. }
        ));
        let second = source.recv().await.unwrap().unwrap();
        assert!(matches!(codec.decode_server(&second).unwrap(), ServerFrame::OnlineUsers(_)));

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_connections_above_limit_are_dropped() {
        let (server, addr, _token, task) = start(1).await;
        let url = format!("ws://{addr}");

        let _first = ws::connect(&url).await.unwrap();
        assert!(ws::connect(&url).await.is_err());

        server.shutdown();
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = ServerConfig::default();
        config.network.listen_addr = taken.local_addr().unwrap();

        let err = Server::new(config).run().await.unwrap_err();
        assert!(matches!(err, ServerError::StartupFailed { .. }));
    }
}
