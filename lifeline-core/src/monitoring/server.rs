//! HTTP server for metrics and recovery status
//!
//! Routes:
//! - `/metrics`: Prometheus text exposition
//! - `/health`, `/healthz`: liveness
//! - `/status`: JSON snapshot of the recovery orchestrator
//! - `/`: short help page

use super::RecoveryMetrics;
use crate::recovery::RecoveryStatus;
use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Anything that can report a recovery status snapshot
pub trait StatusProvider: Send + Sync {
    fn status(&self) -> RecoveryStatus;
}

/// Configuration for the status HTTP server
#[derive(Debug, Clone)]
pub struct StatusServerConfig {
    pub listen_addr: SocketAddr,
    pub metrics_path: String,
}

impl StatusServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl Default for StatusServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 9464)))
    }
}

#[derive(Clone)]
struct ServerState {
    metrics: Arc<RecoveryMetrics>,
    status: Option<Arc<dyn StatusProvider>>,
    metrics_path: Arc<str>,
}

/// Serves `/metrics` and `/status` for a running orchestrator
pub struct StatusServer {
    config: StatusServerConfig,
    state: ServerState,
}

impl StatusServer {
    pub fn new(config: StatusServerConfig, metrics: Arc<RecoveryMetrics>) -> Self {
        let metrics_path = Arc::from(config.metrics_path.as_str());
        Self {
            config,
            state: ServerState {
                metrics,
                status: None,
                metrics_path,
            },
        }
    }

    /// Expose `provider` on `/status`
    pub fn with_status(mut self, provider: Arc<dyn StatusProvider>) -> Self {
        self.state.status = Some(provider);
        self
    }

    /// Bind and serve until the task is dropped
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .with_context(|| format!("Failed to bind status server on {}", self.config.listen_addr))?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr().context("Listener has no local address")?;
        info!(
            "Status server listening on http://{}{}",
            local_addr, self.config.metrics_path
        );

        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let state = self.state.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let state = state.clone();
                    async move { Ok::<_, Infallible>(route(req.method(), req.uri().path(), &state)) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

fn respond(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn route(method: &Method, path: &str, state: &ServerState) -> Response<Full<Bytes>> {
    debug!("Status request: {} {}", method, path);

    if method != Method::GET {
        return respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed");
    }

    if path == "/health" || path == "/healthz" {
        return respond(StatusCode::OK, "text/plain", "OK");
    }

    if path == &*state.metrics_path {
        return match state.metrics.encode() {
            Ok(text) => respond(StatusCode::OK, "text/plain; version=0.0.4", text),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    format!("Error: {}", e),
                )
            }
        };
    }

    if path == "/status" {
        let Some(provider) = &state.status else {
            return respond(StatusCode::NOT_FOUND, "text/plain", "No status provider");
        };
        return match serde_json::to_vec(&provider.status()) {
            Ok(json) => respond(StatusCode::OK, "application/json", json),
            Err(e) => {
                error!("Failed to serialize status: {}", e);
                respond(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    format!("Error: {}", e),
                )
            }
        };
    }

    if path == "/" {
        let help_text = format!(
            "Lifeline connection recovery\n\nEndpoints:\n  {} - Prometheus metrics\n  /status - Recovery status (JSON)\n  /health - Health check\n",
            state.metrics_path
        );
        return respond(StatusCode::OK, "text/plain", help_text);
    }

    warn!("Unknown status endpoint requested: {}", path);
    respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
}
