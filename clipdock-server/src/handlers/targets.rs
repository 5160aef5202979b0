//! Admin watch-target management.

use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use clipdock_core::api::{ApiResponse, UpsertTargetRequest};
use clipdock_model::{WatchTarget, WatchTargetId};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

pub async fn list_targets(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<WatchTarget>>>> {
    let targets = state.store.list().await;
    Ok(Json(ApiResponse::success(targets)))
}

/// Create a target, or replace the configuration of an existing one. The
/// committed hash set of an existing target survives the update.
pub async fn upsert_target(
    State(state): State<AppState>,
    Json(request): Json<UpsertTargetRequest>,
) -> AppResult<Json<ApiResponse<WatchTarget>>> {
    if !request.source_dir.is_dir() {
        return Err(AppError::bad_request(format!(
            "source directory {} does not exist",
            request.source_dir.display()
        )));
    }

    let mut target = match request.id {
        Some(id) => state
            .store
            .get(id)
            .await
            .ok_or_else(|| AppError::not_found(format!("target {id} not found")))?,
        None => WatchTarget::new(
            request.source_dir.clone(),
            request.project_path.clone(),
            request.bin_path.clone(),
            request.consumer,
        ),
    };
    target.source_dir = request.source_dir;
    target.project_path = request.project_path;
    target.bin_path = request.bin_path;
    target.consumer = request.consumer;
    target.enabled = request.enabled;

    let was_watching = state.sync_engine.is_watching(target.id).await;
    state.store.upsert(target.clone()).await?;
    info!(target = %target.id, source = %target.source_dir.display(), "target saved");

    // A live watcher picks up edits through a restart.
    if was_watching {
        if target.enabled {
            state.sync_engine.restart_target(target.id).await?;
        } else {
            state.sync_engine.stop_target(target.id).await;
        }
    }

    Ok(Json(ApiResponse::success(target)))
}

pub async fn delete_target(
    State(state): State<AppState>,
    Path(id): Path<WatchTargetId>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.sync_engine.stop_target(id).await;
    let removed = state.store.remove(id).await?;
    if !removed {
        return Err(AppError::not_found(format!("target {id} not found")));
    }
    info!(target = %id, "target deleted");
    Ok(Json(
        ApiResponse::success(()).with_message("target deleted".to_string()),
    ))
}

pub async fn start_target(
    State(state): State<AppState>,
    Path(id): Path<WatchTargetId>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.store.set_enabled(id, true).await?;
    state.sync_engine.start_target(id).await?;
    Ok(Json(
        ApiResponse::success(()).with_message("target started".to_string()),
    ))
}

pub async fn stop_target(
    State(state): State<AppState>,
    Path(id): Path<WatchTargetId>,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .store
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found(format!("target {id} not found")))?;
    state.store.set_enabled(id, false).await?;
    state.sync_engine.stop_target(id).await;
    Ok(Json(
        ApiResponse::success(()).with_message("target stopped".to_string()),
    ))
}

pub async fn restart_target(
    State(state): State<AppState>,
    Path(id): Path<WatchTargetId>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.sync_engine.restart_target(id).await?;
    Ok(Json(
        ApiResponse::success(()).with_message("target restarted".to_string()),
    ))
}

/// Force a full pass over the target's source directory.
pub async fn resync_target(
    State(state): State<AppState>,
    Path(id): Path<WatchTargetId>,
) -> AppResult<Json<ApiResponse<usize>>> {
    let queued = state.sync_engine.resync_target(id).await?;
    Ok(Json(
        ApiResponse::success(queued).with_message(format!("{queued} files queued")),
    ))
}
