//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rule_count: usize,
    pub version: &'static str,
}

/// `GET /api/health` — liveness plus a store read.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let snapshot = ctx.store.list()?;

    Ok(Json(HealthResponse {
        status: "ok",
        rule_count: snapshot.len(),
        version: crate::config::APP_VERSION,
    }))
}
