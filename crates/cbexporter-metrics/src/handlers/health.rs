use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::router::ExporterState;

pub async fn health_live() -> impl IntoResponse {
    StatusCode::OK
}

/// Ready once the per-node collection loop is running. The body carries the
/// collector snapshot either way.
pub async fn health_ready(State(state): State<Arc<ExporterState>>) -> impl IntoResponse {
    let snapshot = state.status.snapshot();
    let code = if snapshot.running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(snapshot))
}
