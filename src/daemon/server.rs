//! HTTP server for the gateway
//!
//! Serves the route table on a TCP address, or on a Unix socket when the
//! listen address is `unix://<path>`.

use super::api::ApiRequest;
use super::router::RouteTable;
use crate::error::{GatewayError, Result};
use crate::swarm::Cluster;
use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Default listen address, the conventional unencrypted engine port
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:2375";

/// Gateway server - Docker-compatible API in front of a cluster
pub struct GatewayServer {
    listen_addr: String,
    routes: Arc<RouteTable>,
    /// Set once `run` has bound the Unix socket; only then is it ours to remove
    socket_bound: AtomicBool,
}

impl GatewayServer {
    /// Create a server for `cluster`.
    ///
    /// Fails if the route table cannot be built; nothing is served then.
    pub fn new(listen_addr: &str, cluster: Arc<dyn Cluster>) -> Result<Self> {
        let routes = RouteTable::build(cluster)?;
        info!("Registered {} routes", routes.len());

        Ok(Self {
            listen_addr: listen_addr.to_string(),
            routes: Arc::new(routes),
            socket_bound: AtomicBool::new(false),
        })
    }

    /// Get the listen address
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Get the route table
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Build the HTTP service
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.routes))
    }

    /// Bind the listen address and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let app = self.router();

        if let Some(path) = self.socket_path() {
            // Remove a stale socket left by a previous run
            if path.exists() {
                fs::remove_file(path)?;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let listener = UnixListener::bind(path)?;
            self.socket_bound.store(true, Ordering::SeqCst);
            info!("Gateway listening on {}", self.listen_addr);
            axum::serve(listener, app).await?;
        } else {
            let listener = TcpListener::bind(&self.listen_addr).await.map_err(|e| {
                GatewayError::Daemon(format!("Failed to bind {}: {}", self.listen_addr, e))
            })?;
            info!("Gateway listening on {}", listener.local_addr()?);
            axum::serve(listener, app).await?;
        }

        Ok(())
    }

    fn socket_path(&self) -> Option<&Path> {
        self.listen_addr.strip_prefix("unix://").map(Path::new)
    }

    /// Remove the Unix socket, if this server bound one
    pub fn stop(&self) -> Result<()> {
        if !self.socket_bound.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(path) = self.socket_path() {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }

        info!("Gateway stopped");
        Ok(())
    }
}

impl Drop for GatewayServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Create the axum service that routes every request through `routes`
pub fn create_router(routes: Arc<RouteTable>) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(routes)
        .layer(TraceLayer::new_for_http())
}

async fn dispatch(State(routes): State<Arc<RouteTable>>, request: Request) -> Response {
    let req = ApiRequest::new(request.method().clone(), request.uri().clone());
    routes.dispatch(req).into_response()
}
