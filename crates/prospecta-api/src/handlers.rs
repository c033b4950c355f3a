//! API request handlers

pub mod automation;
pub mod health;
pub mod outbound;
pub mod templates;
pub mod workflows;

use axum::{http::StatusCode, Json};
use prospecta_common::Error;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error type
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// Map a domain error onto its HTTP status and body
pub fn api_error(err: Error) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }
    error_response(status, &err.code().to_lowercase(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_mapping() {
        let (status, body) = api_error(Error::MissingVariables(vec!["name".to_string()]));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "missing_variables");
        assert_eq!(body.message, "Missing template variables: name");

        let (status, _) = api_error(Error::Timeout("sync".to_string()));
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }
}
