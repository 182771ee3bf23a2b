// HTTP and WebSocket APIs

pub mod alerts;
mod error;
pub mod offline;
pub mod recommendations;
pub mod sensors;
pub mod websocket;

pub use alerts::create_alert_router;
pub use error::ApiError;
pub use offline::create_offline_router;
pub use recommendations::create_recommendation_router;
pub use sensors::create_sensor_router;
pub use websocket::{create_ws_router, ws_handler};

use crate::sensor::SensorRegistry;
use crate::store::{OfflineStore, SnapshotManager};
use crate::sync::{Connectivity, RemoteSync};
use crate::weather::WeatherSource;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

/// Shared state for every API router
pub struct AppState {
    pub registry: Arc<SensorRegistry>,
    pub store: Arc<OfflineStore>,
    pub remote: Arc<dyn RemoteSync>,
    pub connectivity: Arc<dyn Connectivity>,
    pub weather: Arc<dyn WeatherSource>,
    pub alerts: Arc<SnapshotManager>,
    /// Per-mutation limit for `POST /api/offline/sync`
    pub apply_timeout: Duration,
    /// Stage used when a fertilizer request names none
    pub default_stage: String,
}

/// All API routes on one router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(create_sensor_router(state.clone()))
        .merge(create_recommendation_router(state.clone()))
        .merge(create_offline_router(state.clone()))
        .merge(create_alert_router(state.clone()))
        .merge(create_ws_router(state))
}
