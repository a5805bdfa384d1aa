use crate::constants::{HazardCategory, HAZARD_CATEGORIES};
use crate::pipeline::Aggregator;
use crate::types::NormalizedEvent;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "hazard_feed",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": state.aggregator.source_names(),
    }))
}

/// The merged event list, newest first. Takes no parameters; the renderer
/// filters client side.
async fn events(State(state): State<AppState>) -> Json<Vec<NormalizedEvent>> {
    Json(state.aggregator.aggregate().await)
}

async fn categories() -> Json<&'static [HazardCategory]> {
    Json(&HAZARD_CATEGORIES[..])
}

async fn metrics() -> impl IntoResponse {
    match crate::metrics::render() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(aggregator: Arc<Aggregator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/events", get(events))
        .route("/api/categories", get(categories))
        .route("/metrics", get(metrics))
        .with_state(AppState { aggregator })
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on `addr`
pub async fn start_server(aggregator: Arc<Aggregator>, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_server(aggregator);

    info!("HTTP server listening on http://{}", addr);
    info!("Events:  http://{}/api/events", addr);
    info!("Health:  http://{}/health", addr);

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
