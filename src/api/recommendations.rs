use super::AppState;
use crate::advisor::{
    fertilizer_recommendation_for, irrigation_recommendation, FertilizerRecommendation,
    IrrigationRecommendation,
};
use crate::sensor::Sensor;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct IrrigationParams {
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct FertilizerParams {
    /// Growth stage label; unknown labels fall back to vegetative
    pub stage: Option<String>,
    pub location: Option<String>,
}

pub fn create_recommendation_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/recommendations/irrigation", get(irrigation))
        .route("/api/recommendations/fertilizer", get(fertilizer))
        .with_state(state)
}

fn sensors_at(state: &AppState, location: Option<&str>) -> Vec<Sensor> {
    match location {
        Some(location) => state.registry.list_by_location(location),
        None => state.registry.list_all(),
    }
}

/// GET /api/recommendations/irrigation
async fn irrigation(
    State(state): State<Arc<AppState>>,
    Query(params): Query<IrrigationParams>,
) -> Json<IrrigationRecommendation> {
    let sensors = sensors_at(&state, params.location.as_deref());
    let weather = state.weather.current();
    Json(irrigation_recommendation(&sensors, Some(&weather)))
}

/// GET /api/recommendations/fertilizer
async fn fertilizer(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FertilizerParams>,
) -> Json<FertilizerRecommendation> {
    let sensors = sensors_at(&state, params.location.as_deref());
    let stage = params.stage.as_deref().unwrap_or(&state.default_stage);
    Json(fertilizer_recommendation_for(&sensors, stage))
}
