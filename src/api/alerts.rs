use super::{ApiError, AppState};
use crate::model::Alert;
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create alert API router
pub fn create_alert_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/:id/acknowledge", post(acknowledge_alert))
        .with_state(state)
}

/// GET /api/alerts - Kept alerts, oldest first
async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<Alert>> {
    Json(state.alerts.alerts())
}

/// POST /api/alerts/:id/acknowledge - Acknowledge and queue for sync
async fn acknowledge_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, ApiError> {
    state
        .alerts
        .acknowledge(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Alert '{}' not found", id)))
}
