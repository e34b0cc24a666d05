//! Telemetry server listener
//!
//! Handles the TCP accept loop and spawns one HTTP connection task per socket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ConnectInfo;
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnectionBuilder;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::bus::EventBus;
use crate::collector::Collector;
use crate::error::Result;
use crate::registry::BroadcastRegistry;
use crate::server::config::ServerConfig;
use crate::server::routes;
use crate::server::state::AppState;
use crate::stats::ServerStats;
use crate::store::IndexedCollection;

/// Holds a connection slot for as long as any part of the connection lives
///
/// The connection task keeps one handle and every request carries another in
/// its extensions, so an upgraded WebSocket keeps its slot (and stays counted
/// as active) after the HTTP connection future has finished.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: u64,
    stats: Arc<ServerStats>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionGuard {
    fn new(id: u64, stats: Arc<ServerStats>, permit: Option<OwnedSemaphorePermit>) -> Self {
        ServerStats::incr(&stats.active_connections);
        Self {
            id,
            stats,
            _permit: permit,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        ServerStats::decr(&self.stats.active_connections);
        tracing::debug!(connection_id = self.id, "Connection released");
    }
}

/// Embedded REST and WebSocket server
pub struct TelemetryServer {
    config: ServerConfig,
    collection: Arc<IndexedCollection>,
    bus: EventBus,
    registry: Arc<BroadcastRegistry>,
    stats: Arc<ServerStats>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
    shutdown: CancellationToken,
    serving_since: Mutex<Option<Instant>>,
}

impl TelemetryServer {
    /// Create a server reading from and streaming for `collector`
    pub fn new(config: ServerConfig, collector: &Collector) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };
        let stats = Arc::new(ServerStats::new());

        Self {
            config,
            collection: Arc::clone(collector.collection()),
            bus: collector.bus().clone(),
            registry: Arc::new(BroadcastRegistry::with_stats(Arc::clone(&stats))),
            stats,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
            shutdown: CancellationToken::new(),
            serving_since: Mutex::new(None),
        }
    }

    /// Get a reference to the broadcast registry
    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    pub fn collection(&self) -> &Arc<IndexedCollection> {
        &self.collection
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// When the current `serve_until` call started listening, if one is running
    pub fn serving_since(&self) -> Option<Instant> {
        *self.serving_since.lock()
    }

    /// Build the router this server answers with
    ///
    /// Uptime reported by the router counts from this call.
    pub fn router(&self) -> Router {
        self.build_router(Instant::now())
    }

    fn build_router(&self, started_at: Instant) -> Router {
        let state = AppState::new(
            self.config.clone(),
            Arc::clone(&self.collection),
            Arc::clone(&self.registry),
        )
        .with_shutdown(self.shutdown.clone())
        .with_started_at(started_at);

        routes::router(state)
    }

    /// Run the server
    ///
    /// This method blocks until the process is shut down.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown the listener is dropped, the bus bridge is detached and
    /// every streaming client is closed.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;
        let addr = listener.local_addr()?;
        let started_at = Instant::now();
        *self.serving_since.lock() = Some(started_at);
        let app = self.build_router(started_at);
        let subscriptions = self.registry.attach(&self.bus);

        tracing::info!(addr = %addr, ws_path = %self.config.ws_path, "Telemetry server listening");

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener, app) => result,
        };

        drop(listener);
        for subscription in &subscriptions {
            subscription.dispose();
        }
        self.shutdown.cancel();
        let closed = self.registry.close_all();
        *self.serving_since.lock() = None;
        tracing::info!(addr = %addr, clients_closed = closed, "Telemetry server stopped");

        result
    }

    async fn accept_loop(&self, listener: &TcpListener, app: Router) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr, app.clone());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr, app: Router) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    ServerStats::incr(&self.stats.connections_rejected);
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        ServerStats::incr(&self.stats.connections_accepted);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let guard = Arc::new(ConnectionGuard::new(
            connection_id,
            Arc::clone(&self.stats),
            permit,
        ));
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let request_guard = Arc::clone(&guard);
            let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
                request.extensions_mut().insert(ConnectInfo(peer_addr));
                request.extensions_mut().insert(Arc::clone(&request_guard));
                app.clone().call(request)
            });
            let builder = ConnectionBuilder::new(TokioExecutor::new());
            let connection = builder.serve_connection_with_upgrades(TokioIo::new(socket), service);

            tokio::select! {
                result = connection => {
                    if let Err(e) = result {
                        tracing::debug!(
                            connection_id = connection_id,
                            error = %e,
                            "Connection error"
                        );
                    }
                }
                _ = shutdown.cancelled() => {}
            }

            tracing::debug!(connection_id = connection_id, "Connection closed");
            drop(guard);
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}

impl std::fmt::Debug for TelemetryServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryServer")
            .field("bind_addr", &self.config.bind_addr)
            .field("registry", &self.registry)
            .finish()
    }
}
