use super::{ApiError, AppState};
use crate::store::{DrainReport, Mutation, MutationDraft, OfflineSnapshot, StorageUsage};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

/// Create offline store API router
pub fn create_offline_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/offline/snapshot", get(get_snapshot))
        .route("/api/offline/mutations", get(list_mutations).post(enqueue_mutation))
        .route("/api/offline/sync", post(sync_now))
        .route("/api/offline/usage", get(storage_usage))
        .with_state(state)
}

/// GET /api/offline/snapshot - Last saved farm state
async fn get_snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OfflineSnapshot>, ApiError> {
    Ok(Json(state.store.load_snapshot()?))
}

/// GET /api/offline/mutations - Pending mutations, oldest first
async fn list_mutations(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Mutation>>, ApiError> {
    Ok(Json(state.store.pending()?))
}

/// POST /api/offline/mutations - Queue a mutation for sync
///
/// `id` and `enqueuedAt` are optional and assigned when absent. 409 if the
/// id is already queued.
async fn enqueue_mutation(
    State(state): State<Arc<AppState>>,
    body: Result<Json<MutationDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Mutation>), ApiError> {
    let Json(draft) = body?;
    let mutation = state.store.enqueue(draft)?;
    Ok((StatusCode::CREATED, Json(mutation)))
}

/// POST /api/offline/sync - Drain the queue now
///
/// 409 if a drain is already running.
async fn sync_now(State(state): State<Arc<AppState>>) -> Result<Json<DrainReport>, ApiError> {
    let report = state
        .store
        .drain(
            state.remote.as_ref(),
            state.connectivity.as_ref(),
            state.apply_timeout,
        )
        .await?;

    info!(
        applied = report.applied,
        remaining = report.remaining,
        "Manual sync finished"
    );

    Ok(Json(report))
}

/// GET /api/offline/usage - Bytes held by the snapshot and queue
async fn storage_usage(State(state): State<Arc<AppState>>) -> Result<Json<StorageUsage>, ApiError> {
    Ok(Json(state.store.storage_usage()?))
}
