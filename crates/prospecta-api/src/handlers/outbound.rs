//! Email send and enrichment handlers

use axum::{extract::State, http::StatusCode, Json};
use prospecta_core::{SendTemplateOutcome, SendTemplateRequest};
use serde::Deserialize;

use super::{api_error, error_response, ApiError};
use crate::state::AppState;

/// Request body for domain enrichment
#[derive(Debug, Deserialize)]
pub struct EnrichmentRequest {
    pub domain: String,
    #[serde(default = "default_enrichment_action")]
    pub action: String,
}

fn default_enrichment_action() -> String {
    "domain_search".to_string()
}

/// Render a template and send it
///
/// POST /api/v1/emails/send
pub async fn send_email(
    State(state): State<AppState>,
    Json(input): Json<SendTemplateRequest>,
) -> Result<Json<SendTemplateOutcome>, ApiError> {
    if input.to.trim().is_empty() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "Recipient address is required",
        ));
    }

    let outcome = state
        .orchestrator
        .send_template(input)
        .await
        .map_err(api_error)?;
    Ok(Json(outcome))
}

/// POST /api/v1/enrichment
pub async fn enrich(
    State(state): State<AppState>,
    Json(input): Json<EnrichmentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if input.domain.trim().is_empty() {
        return Err(error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "validation_error",
            "Domain is required",
        ));
    }

    let value = state
        .orchestrator
        .enrich_domain(input.domain.trim(), &input.action)
        .await
        .map_err(api_error)?;
    Ok(Json(value))
}
