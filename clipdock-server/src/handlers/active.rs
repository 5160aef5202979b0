//! Active-project reporting.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use clipdock_core::api::ActiveProjectReport;
use clipdock_model::ConsumerKind;

use crate::handlers::jobs::parse_consumer;
use crate::infra::{app_state::AppState, errors::AppResult};

/// Report for the default consumer family.
pub async fn report(
    State(state): State<AppState>,
    Json(report): Json<ActiveProjectReport>,
) -> AppResult<impl IntoResponse> {
    report_for_consumer(state, ConsumerKind::Premiere, report).await
}

/// Report for a specific consumer family.
pub async fn report_for(
    State(state): State<AppState>,
    Path(consumer): Path<String>,
    Json(report): Json<ActiveProjectReport>,
) -> AppResult<impl IntoResponse> {
    let consumer = parse_consumer(&consumer)?;
    report_for_consumer(state, consumer, report).await
}

async fn report_for_consumer(
    state: AppState,
    consumer: ConsumerKind,
    report: ActiveProjectReport,
) -> AppResult<impl IntoResponse> {
    state
        .broker
        .report_active(consumer, report.project_path)
        .await;
    // Echo the normalized record back so the panel can verify routing.
    let current = state.broker.current_project(consumer).await;
    Ok(Json(ActiveProjectReport {
        project_path: current,
    }))
}
