//! Read-only dashboard API over the holdings table.

mod auth;
pub mod routes;

use std::net::SocketAddr;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::Result;
use store::SharedStore;
use tracker::TrackerHandle;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub tracker: TrackerHandle,
    pub dashboard_token: String,
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "Dashboard API listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
