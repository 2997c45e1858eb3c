//! HTTP surface for the resolver: `POST /classify` and `GET /health`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use intentd_ai::Resolver;
use intentd_core::{ClassificationRequest, ClassificationResult, Health};
use serde_json::json;
use tracing::{info, warn};

/// Build the service router around a shared resolver.
pub fn router(resolver: Arc<Resolver>) -> Router {
    Router::new()
        .route("/classify", post(classify))
        .route("/health", get(health))
        .with_state(resolver)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, resolver: Arc<Resolver>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, source = resolver.source(), "intent service listening");
    axum::serve(listener, router(resolver))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("intent service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Malformed payloads are the only caller-visible failure.
struct BadRequest(JsonRejection);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let detail = self.0.body_text();
        warn!(status = status.as_u16(), %detail, "rejected classify payload");
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

async fn classify(
    State(resolver): State<Arc<Resolver>>,
    payload: Result<Json<ClassificationRequest>, JsonRejection>,
) -> Result<Json<ClassificationResult>, BadRequest> {
    let Json(request) = payload.map_err(BadRequest)?;
    Ok(Json(resolver.resolve_request(&request).await))
}

async fn health() -> (StatusCode, Json<Health>) {
    (StatusCode::OK, Json(Resolver::health()))
}
