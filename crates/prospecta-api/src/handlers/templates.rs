//! Template handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use prospecta_common::types::{TemplateCategory, TemplateId};
use prospecta_core::templates::TemplateVars;
use prospecta_core::TemplatePreview;
use prospecta_storage::models::{
    CreateTemplate, EmailTemplate, TemplateFilter, TemplatePerformance, UpdateTemplate,
};
use serde::{Deserialize, Serialize};

use super::{api_error, error_response, ApiError};
use crate::state::AppState;

/// Template list response
#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateListResponse {
    pub data: Vec<EmailTemplate>,
    pub total: usize,
}

/// Request body for previews
#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub variables: TemplateVars,
}

/// Query parameters for recommendations
#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub segment: String,
    pub category: Option<TemplateCategory>,
}

/// Query parameters for variant selection
#[derive(Debug, Deserialize)]
pub struct VariantQuery {
    pub base_key: String,
}

/// GET /api/v1/templates
pub async fn list_templates(
    State(state): State<AppState>,
    Query(filter): Query<TemplateFilter>,
) -> Result<Json<TemplateListResponse>, ApiError> {
    let data = state.templates.list(&filter).await.map_err(api_error)?;
    Ok(Json(TemplateListResponse {
        total: data.len(),
        data,
    }))
}

/// POST /api/v1/templates
pub async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<CreateTemplate>,
) -> Result<(StatusCode, Json<EmailTemplate>), ApiError> {
    if input.subject.is_empty() || input.body.is_empty() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "Subject and body are required",
        ));
    }

    let template = state.templates.create(input).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/v1/templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
) -> Result<Json<EmailTemplate>, ApiError> {
    let template = state.templates.get(id).await.map_err(api_error)?;
    Ok(Json(template))
}

/// PUT /api/v1/templates/:id
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    Json(input): Json<UpdateTemplate>,
) -> Result<Json<EmailTemplate>, ApiError> {
    let template = state.templates.update(id, input).await.map_err(api_error)?;
    Ok(Json(template))
}

/// DELETE /api/v1/templates/:id
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
) -> Result<StatusCode, ApiError> {
    state.templates.delete(id).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/templates/:id/duplicate
pub async fn duplicate_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
) -> Result<(StatusCode, Json<EmailTemplate>), ApiError> {
    let copy = state.templates.duplicate(id).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// PUT /api/v1/templates/:id/performance
pub async fn record_performance(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    Json(performance): Json<TemplatePerformance>,
) -> Result<StatusCode, ApiError> {
    state
        .templates
        .record_performance(id, performance)
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/templates/:id/preview
pub async fn preview_template(
    State(state): State<AppState>,
    Path(id): Path<TemplateId>,
    Json(input): Json<PreviewRequest>,
) -> Result<Json<TemplatePreview>, ApiError> {
    let preview = state
        .templates
        .preview(id, &input.variables)
        .await
        .map_err(api_error)?;
    Ok(Json(preview))
}

/// GET /api/v1/templates/recommend
pub async fn recommend_templates(
    State(state): State<AppState>,
    Query(query): Query<RecommendQuery>,
) -> Result<Json<TemplateListResponse>, ApiError> {
    let data = state
        .templates
        .recommend(&query.segment, query.category)
        .await
        .map_err(api_error)?;
    Ok(Json(TemplateListResponse {
        total: data.len(),
        data,
    }))
}

/// GET /api/v1/templates/variant
pub async fn best_variant(
    State(state): State<AppState>,
    Query(query): Query<VariantQuery>,
) -> Result<Json<EmailTemplate>, ApiError> {
    state
        .templates
        .best_variant(&query.base_key)
        .await
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| {
            error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                format!("No active variant for {}", query.base_key),
            )
        })
}
