//! Consumer-facing job endpoints.
//!
//! Panels cannot hold connections open, so delivery is pull-only: they
//! poll for the next job, and a poll that releases nothing answers with
//! an empty JSON object rather than a status code the panel runtime
//! would surface as an error.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use tracing::info;

use clipdock_model::{ConsumerKind, Job, JobId, JobResult};

use crate::infra::{
    app_state::AppState,
    errors::{AppError, AppResult},
};

/// Poll for the default consumer family.
pub async fn poll_next(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    poll_for(state, ConsumerKind::Premiere).await
}

/// Poll for a specific consumer family.
pub async fn poll_next_for(
    State(state): State<AppState>,
    Path(consumer): Path<String>,
) -> AppResult<impl IntoResponse> {
    let consumer = parse_consumer(&consumer)?;
    poll_for(state, consumer).await
}

async fn poll_for(state: AppState, consumer: ConsumerKind) -> AppResult<impl IntoResponse> {
    match state.broker.poll(consumer).await {
        Some(job) => {
            info!(job = %job.id, consumer = %consumer, files = job.files.len(), "job released");
            Ok(Json(serde_json::to_value(job).map_err(|err| {
                AppError::internal(format!("failed to serialize job: {err}"))
            })?))
        }
        None => Ok(Json(json!({}))),
    }
}

/// Submit a job directly, bypassing the folder sync pipeline.
pub async fn submit(
    State(state): State<AppState>,
    Json(job): Json<Job>,
) -> AppResult<impl IntoResponse> {
    let id = job.id;
    state.broker.submit(job).await?;
    Ok(Json(json!({ "status": "accepted", "id": id })))
}

/// Report the outcome of a previously delivered job.
pub async fn report_result(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Json(result): Json<JobResult>,
) -> AppResult<impl IntoResponse> {
    if result.job_id != id {
        return Err(AppError::bad_request(format!(
            "path job id {id} does not match body job id {}",
            result.job_id
        )));
    }
    state.broker.report_result(result).await?;
    Ok(Json(json!({ "status": "received" })))
}

pub(crate) fn parse_consumer(raw: &str) -> Result<ConsumerKind, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("unknown consumer '{raw}'")))
}
