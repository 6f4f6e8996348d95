use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use brain_core::handler::{PresetOutcome, PresetService};
use preset_protocol::ErrorEnvelope;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Largest accepted request body. Preset requests are a pedal name plus a short description.
pub const MAX_REQUEST_BYTES: usize = 64 * 1024;

pub fn router(service: PresetService) -> Router {
    Router::new()
        .route(
            "/",
            post(generate_preset)
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
                .fallback(method_not_allowed),
        )
        .route("/pedals", get(list_pedals))
        .route("/health", get(health))
        .fallback(route_not_found)
        .with_state(service)
}

async fn generate_preset(
    State(service): State<PresetService>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection.status();
            tracing::warn!(status = status.as_u16(), "POST / rejected: {}", rejection.body_text());
            let envelope = if status == StatusCode::PAYLOAD_TOO_LARGE {
                ErrorEnvelope::new("Request body too large")
            } else {
                ErrorEnvelope::invalid_request()
            };
            return (status, Json(envelope)).into_response();
        }
    };

    let started = Instant::now();
    let outcome = service.handle_body(&body).await;
    let status = outcome.status();

    tracing::info!(
        status = status.as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "POST /"
    );

    match outcome {
        PresetOutcome::Generated(preset) => (status, Json(preset)).into_response(),
        other => {
            let envelope = other
                .error_envelope()
                .unwrap_or_else(ErrorEnvelope::generation_failed);
            (status, Json(envelope)).into_response()
        }
    }
}

async fn list_pedals(State(service): State<PresetService>) -> Json<Vec<String>> {
    Json(
        service
            .catalog()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn route_not_found() -> (StatusCode, Json<ErrorEnvelope>) {
    (StatusCode::NOT_FOUND, Json(ErrorEnvelope::new("Not found")))
}

async fn method_not_allowed() -> (StatusCode, Json<ErrorEnvelope>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorEnvelope::new("Method not allowed")),
    )
}

/// HTTP listener running on the current tokio runtime.
pub struct PresetServer {
    listen_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join_handle: JoinHandle<std::io::Result<()>>,
}

impl PresetServer {
    pub async fn bind(addr: SocketAddr, service: PresetService) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let listen_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let app = router(service);
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(Self {
            listen_addr,
            shutdown: Some(shutdown_tx),
            join_handle,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Stops accepting connections and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join_handle
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }
}
