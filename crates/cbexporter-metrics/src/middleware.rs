use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cbexporter_common::error::ExporterError;
use tracing::debug;

use crate::router::ExporterState;

/// Requires `Authorization: Bearer <token>` when a scrape token is configured.
pub async fn bearer_auth(
    State(state): State<Arc<ExporterState>>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.token.as_deref() else {
        return next.run(req).await;
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            next.run(req).await
        }
        Some(_) => {
            debug!(path = %req.uri().path(), "rejected scrape with wrong token");
            json_error(ExporterError::Unauthorized("invalid bearer token".to_string()))
        }
        None => json_error(ExporterError::Unauthorized(
            "missing bearer token".to_string(),
        )),
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right.iter())
        .fold(0_u8, |acc, (l, r)| acc | (l ^ r))
        == 0
}

fn json_error(error: ExporterError) -> Response {
    let status = match error {
        ExporterError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ExporterError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = serde_json::json!({
        "code": error.error_code(),
        "message": error.to_string(),
    });

    (status, Json(body)).into_response()
}
