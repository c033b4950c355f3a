//! Automation handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use prospecta_core::{
    ActivityEvent, AutomationStats, DashboardView, ResponseBody, SystemHealth,
};
use prospecta_storage::models::{
    AutomationConfig, AutomationConfigPatch, MAX_STATS_TIMEFRAME_DAYS,
};
use serde::Deserialize;
use tracing::info;

use super::{api_error, error_response, ApiError};
use crate::state::AppState;

/// Query parameters for statistics
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    /// Timeframe in days; the configured timeframe when absent
    pub period: Option<i64>,
    #[serde(default)]
    pub refresh: bool,
}

/// Automation statistics
///
/// GET /api/v1/automation/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<AutomationStats>, ApiError> {
    if matches!(query.period, Some(days) if !(1..=MAX_STATS_TIMEFRAME_DAYS).contains(&days)) {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            format!("period must be between 1 and {} days", MAX_STATS_TIMEFRAME_DAYS),
        ));
    }

    Ok(Json(
        state
            .orchestrator
            .stats_for_period(query.period, query.refresh)
            .await,
    ))
}

/// Current configuration
///
/// GET /api/v1/automation/config
pub async fn get_config(State(state): State<AppState>) -> Result<Json<AutomationConfig>, ApiError> {
    let config = state.orchestrator.load_config().await.map_err(api_error)?;
    Ok(Json(config))
}

/// Partial configuration update
///
/// PUT /api/v1/automation/config
pub async fn update_config(
    State(state): State<AppState>,
    Json(patch): Json<AutomationConfigPatch>,
) -> Result<Json<AutomationConfig>, ApiError> {
    let config = state
        .orchestrator
        .update_config(&patch)
        .await
        .map_err(api_error)?;
    Ok(Json(config))
}

/// Recent activity feed
///
/// GET /api/v1/automation/activity
pub async fn get_activity(State(state): State<AppState>) -> Json<Vec<ActivityEvent>> {
    Json(state.orchestrator.recent_activity().await)
}

/// Query parameters for the health snapshot
#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// Re-run the checks instead of serving the polled snapshot
    #[serde(default)]
    pub refresh: bool,
}

/// Health snapshot
///
/// GET /api/v1/automation/health
pub async fn get_health(
    State(state): State<AppState>,
    Query(query): Query<HealthQuery>,
) -> Json<SystemHealth> {
    Json(state.orchestrator.system_health(query.refresh).await)
}

/// GET /api/v1/automation/dashboard
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.orchestrator.dashboard().await)
}

/// POST /api/v1/automation/start
pub async fn start(State(state): State<AppState>) -> Result<Json<AutomationConfig>, ApiError> {
    let config = state
        .orchestrator
        .start_automation()
        .await
        .map_err(api_error)?;
    info!("Automation start requested through API");
    Ok(Json(config))
}

/// POST /api/v1/automation/stop
pub async fn stop(State(state): State<AppState>) -> Result<Json<AutomationConfig>, ApiError> {
    let config = state
        .orchestrator
        .stop_automation()
        .await
        .map_err(api_error)?;
    info!("Automation stop requested through API");
    Ok(Json(config))
}

/// POST /api/v1/automation/sync
pub async fn sync(State(state): State<AppState>) -> Result<Json<ResponseBody>, ApiError> {
    let body = state
        .orchestrator
        .sync_automation_status()
        .await
        .map_err(|e| api_error(e.into()))?;
    Ok(Json(body))
}
