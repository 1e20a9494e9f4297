// src/server/mod.rs

//! Development HTTP servers with live reload.
//!
//! Each server serves one build root on its own port. All of them are owned
//! by a [`DevServerHub`], which is also the pipeline's reload sink: a reload
//! signal is forwarded to every server whose root contains a changed path.

pub mod livereload;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use axum::routing::get;
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, error, info};

use crate::errors::{Result, SitepipeError};
use crate::pipeline::{ReloadSignal, ReloadSink};

pub use livereload::{inject_script, ClientMessage, RELOAD_PATH};

/// What to serve and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    /// Absolute directory to serve.
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
}

impl ServerSpec {
    pub fn new(root: impl Into<PathBuf>, host: impl Into<String>, port: u16) -> Self {
        Self {
            root: root.into(),
            host: host.into(),
            port,
        }
    }
}

/// Router for one build root: static files, the SSE endpoint, and script
/// injection for HTML responses.
pub fn router(root: &Path, reload_tx: broadcast::Sender<ClientMessage>) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(livereload::reload_events))
        .with_state(reload_tx)
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(livereload::inject_into_html))
}

struct ServerEntry {
    spec: ServerSpec,
    reload_tx: broadcast::Sender<ClientMessage>,
}

/// Owns every running dev server.
pub struct DevServerHub {
    servers: Vec<ServerEntry>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for DevServerHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let specs: Vec<&ServerSpec> = self.servers.iter().map(|s| &s.spec).collect();
        f.debug_struct("DevServerHub")
            .field("servers", &specs)
            .finish_non_exhaustive()
    }
}

impl DevServerHub {
    /// Spawn one server per spec.
    ///
    /// Binding happens inside each server's task: a port that cannot be bound
    /// is logged as an error and only that server is lost.
    pub fn start(specs: Vec<ServerSpec>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut servers = Vec::with_capacity(specs.len());
        let mut handles = Vec::with_capacity(specs.len());

        for spec in specs {
            let (reload_tx, _) = broadcast::channel(16);
            let app = router(&spec.root, reload_tx.clone());
            let task_spec = spec.clone();
            let rx = shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                if let Err(err) = serve(app, &task_spec, rx).await {
                    error!(root = %task_spec.root.display(), error = %err, "dev server stopped");
                    eprintln!("[sitepipe] {err}");
                }
            }));
            servers.push(ServerEntry { spec, reload_tx });
        }

        Self {
            servers,
            shutdown_tx,
            handles: Mutex::new(handles),
        }
    }

    /// Close live-reload streams, stop accepting connections, and wait for
    /// every server task to finish.
    pub async fn shutdown(&self) {
        for server in &self.servers {
            let _ = server.reload_tx.send(ClientMessage::Shutdown);
        }
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = {
            let mut guard = self.handles.lock().unwrap_or_else(|p| p.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "dev server task panicked");
            }
        }
        info!("dev servers stopped");
    }
}

impl ReloadSink for DevServerHub {
    fn reload(&self, signal: ReloadSignal) {
        for server in self.servers.iter().filter(|s| signal.concerns(&s.spec.root)) {
            // No receivers just means no browser is connected.
            let clients = server.reload_tx.send(ClientMessage::Reload).unwrap_or(0);
            debug!(port = server.spec.port, clients, "reload pushed");
        }
    }
}

/// Reload sink handed to the pipeline before any server exists.
///
/// Signals are dropped until [`ReloadRelay::attach`] is called, which
/// happens once the dev servers are up.
#[derive(Debug, Default)]
pub struct ReloadRelay {
    hub: OnceLock<Arc<DevServerHub>>,
}

impl ReloadRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if a hub was already attached.
    pub fn attach(&self, hub: Arc<DevServerHub>) -> bool {
        self.hub.set(hub).is_ok()
    }
}

impl ReloadSink for ReloadRelay {
    fn reload(&self, signal: ReloadSignal) {
        if let Some(hub) = self.hub.get() {
            hub.reload(signal);
        }
    }
}

async fn serve(app: Router, spec: &ServerSpec, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let addr = format!("{}:{}", spec.host, spec.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| SitepipeError::Server {
            port: spec.port,
            message: format!("cannot bind {addr}: {e}"),
        })?;

    let local: Option<SocketAddr> = listener.local_addr().ok();
    info!(root = %spec.root.display(), addr = ?local, "serving");
    println!("[sitepipe] Serving {} at http://{}", spec.root.display(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // Either a real shutdown or the hub being dropped.
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| SitepipeError::Server {
            port: spec.port,
            message: e.to_string(),
        })
}
