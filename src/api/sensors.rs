use super::{ApiError, AppState};
use crate::sensor::{Sensor, SensorKind};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for sensor listing
#[derive(Deserialize)]
pub struct SensorQueryParams {
    /// Exact kind, e.g. `soil_moisture`
    pub kind: Option<String>,
    /// Exact location, e.g. `Field A`
    pub location: Option<String>,
}

/// Create sensor API router
pub fn create_sensor_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/sensors", get(list_sensors))
        .route("/api/sensors/:id", get(get_sensor))
        .with_state(state)
}

/// GET /api/sensors - List sensors in configuration order
///
/// Both filters can be combined (AND logic):
/// - ?kind=soil_moisture&location=Field%20B
async fn list_sensors(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SensorQueryParams>,
) -> Json<Vec<Sensor>> {
    let kind = params.kind.as_deref().map(SensorKind::from);

    let sensors = state
        .registry
        .list_all()
        .into_iter()
        .filter(|s| kind.as_ref().map_or(true, |k| &s.kind == k))
        .filter(|s| {
            params
                .location
                .as_deref()
                .map_or(true, |l| s.location == l)
        })
        .collect();

    Json(sensors)
}

/// GET /api/sensors/:id - Get one sensor
async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Sensor>, ApiError> {
    state
        .registry
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Sensor '{}' not found", id)))
}
