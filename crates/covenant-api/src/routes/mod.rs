//! API route handlers

pub mod host;
pub mod loans;

use axum::{extract::State, routing::get, Json, Router};

use crate::dto::HealthResponse;
use crate::AppState;

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/host", host::router())
        .nest("/loans", loans::router())
        .with_state(state)
}

/// GET /health - Liveness, plus how many loans this host carries
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let host = state.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        loans: host.loans.len(),
        paused: host.pause.paused,
    })
}
