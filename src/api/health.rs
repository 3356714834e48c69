//! `GET /api/health` — liveness probe for load balancers and container
//! health checks. Runs a trivial DB query so infrastructure can detect
//! database connectivity issues in addition to process liveness.

use axum::{extract::State, Json};
use serde_json::json;

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "db": db_ok,
    }))
}
