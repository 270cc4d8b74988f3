use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::warn;

use common::{HoldingsTable, PortfolioSummary};

use crate::{auth::require_auth, AppState};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/holdings", get(get_holdings))
        .route("/api/summary", get(get_summary))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

async fn load(state: &AppState) -> Result<HoldingsTable, (StatusCode, Json<Value>)> {
    state.store.read().await.map_err(|e| {
        warn!(error = %e, "Dashboard could not read holdings");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string() })),
        )
    })
}

// ─── Holdings ─────────────────────────────────────────────────────────────────

async fn get_holdings(State(state): State<AppState>) -> ApiResult {
    let table = load(&state).await?;
    Ok(Json(json!({
        "holdings": table.holdings,
        "total": table.holdings.len(),
        "active": table.open_count(),
    })))
}

// ─── Summary ──────────────────────────────────────────────────────────────────

async fn get_summary(State(state): State<AppState>) -> ApiResult {
    let table = load(&state).await?;
    let summary = PortfolioSummary::from_holdings(&table.holdings);
    let tracking = state.tracker.state().await;
    Ok(Json(json!({
        "tracking": tracking,
        "active": summary.active,
        "targets": summary.targets,
        "stops": summary.stops,
        "exited": summary.exited,
        "total_pnl": summary.total_pnl,
    })))
}
