//! REST API routes.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::planner::{plan_adventure, PlanError, PlanRequest};
use crate::state::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/plan", post(plan))
        .route("/health", get(health))
}

async fn health() -> &'static str {
    "OK"
}

async fn plan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlanRequest>,
) -> impl IntoResponse {
    match plan_adventure(&state, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(PlanError::InvalidRequest(message)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": message })),
        )
            .into_response(),
        Err(PlanError::Routing(err)) => {
            tracing::error!(error = %err, "plan failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
