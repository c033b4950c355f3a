//! Workflow trigger handlers

use axum::{
    extract::{Path, State},
    Json,
};
use prospecta_core::{ResponseBody, WorkflowAction};
use serde::Deserialize;

use super::{api_error, ApiError};
use crate::state::AppState;

/// Request body for a single trigger
#[derive(Debug, Default, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Request body for a batch trigger
#[derive(Debug, Deserialize)]
pub struct BatchTriggerRequest {
    pub actions: Vec<WorkflowAction>,
}

/// POST /api/v1/workflows/:workflow_id/trigger
pub async fn trigger(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Json(input): Json<TriggerRequest>,
) -> Result<Json<ResponseBody>, ApiError> {
    let body = state
        .orchestrator
        .trigger_workflow(&workflow_id, input.payload, None)
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(body))
}

/// POST /api/v1/workflows/batch
pub async fn batch_trigger(
    State(state): State<AppState>,
    Json(input): Json<BatchTriggerRequest>,
) -> Result<Json<ResponseBody>, ApiError> {
    let body = state
        .orchestrator
        .batch_trigger_workflows(&input.actions, None)
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(body))
}
