//! HTTP transport implementation
//!
//! `POST /mcp` accepts one JSON-RPC message per request; `GET /health`
//! reports liveness and backend modes.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::{net::TcpListener, sync::watch};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{MessageHandler, Transport, process_line};

/// HTTP transport for remote access
pub struct HttpTransport {
    host: String,
    port: u16,
    shutdown_tx: watch::Sender<bool>,
}

/// Application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<dyn MessageHandler>,
}

impl HttpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            host: host.into(),
            port,
            shutdown_tx,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build the axum router serving `handler`
pub fn router(handler: Arc<dyn MessageHandler>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/mcp", post(handle_rpc))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { handler })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(&self, handler: Arc<dyn MessageHandler>) -> Result<()> {
        let addr = self.address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {addr}"))?;

        info!("HTTP server listening on http://{}", addr);

        let mut shutdown = self.shutdown_tx.subscribe();
        axum::serve(listener, router(handler))
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .context("HTTP server error")?;

        info!("HTTP server stopped");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Shutting down HTTP transport");
        self.shutdown_tx.send_replace(true);
        Ok(())
    }
}

// raw body so malformed JSON gets a JSON-RPC parse error instead of a 4xx
async fn handle_rpc(State(state): State<AppState>, body: String) -> Response {
    match process_line(state.handler.as_ref(), body.trim()).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn handle_health(State(state): State<AppState>) -> Response {
    Json(state.handler.health().await).into_response()
}
