use crate::app::{RelayError, RelayOutcome, RelayService};
use crate::constants::CORRELATION_HEADERS;
use crate::types::{AcceptRequest, CorrelationId};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "description": self.to_string() }))).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "slack-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn correlation_id(headers: &HeaderMap) -> CorrelationId {
    let token = CORRELATION_HEADERS
        .iter()
        .find_map(|name| header_str(headers, name).filter(|v| !v.trim().is_empty()));
    CorrelationId::from_header(token)
}

/// Accepts one lifecycle event. The body is read leniently: anything that is
/// not a JSON object is treated as an event with no identifying fields.
async fn accept(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = serde_json::from_slice::<AcceptRequest>(&body).unwrap_or_else(|e| {
        debug!("Unreadable accept body: {}", e);
        AcceptRequest::default()
    });
    let authorization = header_str(&headers, AUTHORIZATION.as_str());

    match state
        .relay
        .relay(request, authorization, correlation_id(&headers))
        .await
    {
        Ok(RelayOutcome::Forwarded) | Ok(RelayOutcome::NoOp(_)) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(relay: Arc<RelayService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/accept", post(accept))
        .with_state(AppState { relay })
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received, draining in-flight requests");
    }
}

/// Serve `router` on `addr` until ctrl-c
pub async fn start_server(router: Router, addr: SocketAddr) -> crate::error::Result<()> {
    info!("HTTP server running on http://{}", addr);
    info!("Accepting events on http://{}/accept", addr);

    Server::bind(&addr)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
