use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::adapters::http::app_state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

/// GET /healthz
/// Liveness only; never touches the database.
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}
