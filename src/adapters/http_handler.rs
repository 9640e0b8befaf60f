//! Axum front end exposing the gateway over HTTP.
//!
//! * `POST /handle` – body is an outbound request description, reply is a
//!   [`GatewayResponse`]. Outer status 200 means the backend was attempted (check the
//!   payload `error`); 400 and 429 mean the gateway rejected the call.
//! * `GET /health` – `{"status":"ok"}`, no side effects.
//!
//! Any other method or path still gets a JSON [`GatewayResponse`] (405 or 404).
use std::{any::Any, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::core::{GatewayService, models::GatewayResponse};

/// HTTP handler for the fetchgate endpoints
#[derive(Clone)]
pub struct HttpHandler {
    gateway: Arc<GatewayService>,
    max_body_bytes: usize,
}

impl HttpHandler {
    pub fn new(gateway: Arc<GatewayService>, max_body_bytes: usize) -> Self {
        Self {
            gateway,
            max_body_bytes,
        }
    }

    /// Build the router with body limit, panic isolation and access logging.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/handle", post(handle).fallback(method_not_allowed))
            .route("/health", get(health).fallback(method_not_allowed))
            .fallback(not_found)
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TraceLayer::new_for_http())
            .with_state(self.gateway.clone())
    }
}

async fn handle(
    State(gateway): State<Arc<GatewayService>>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<GatewayResponse>) {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection.status();
            tracing::warn!("Rejected request body: {}", rejection.body_text());
            return (
                status,
                Json(GatewayResponse::rejected(
                    status.as_u16(),
                    rejection.body_text(),
                )),
            );
        }
    };

    let reply = gateway.handle(&body).await;
    (reply.status, Json(reply.body))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn method_not_allowed() -> (StatusCode, Json<GatewayResponse>) {
    rejection(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

async fn not_found() -> (StatusCode, Json<GatewayResponse>) {
    rejection(StatusCode::NOT_FOUND, "not found")
}

fn rejection(status: StatusCode, message: &str) -> (StatusCode, Json<GatewayResponse>) {
    (
        status,
        Json(GatewayResponse::rejected(status.as_u16(), message)),
    )
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);

    rejection(StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
}
