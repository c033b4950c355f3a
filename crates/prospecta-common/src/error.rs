//! Error types for Prospecta

use thiserror::Error;

/// Main error type for Prospecta
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing template variables: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream service returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Upstream service timed out: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Prospecta
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Config(_) => 500,
            Error::Database(_) => 500,
            Error::Validation(_) => 422,
            Error::MissingVariables(_) => 422,
            Error::Precondition(_) => 400,
            Error::NotFound(_) => 404,
            Error::Upstream { .. } => 502,
            Error::Timeout(_) => 504,
            Error::Unavailable(_) => 503,
            Error::Internal(_) => 500,
            Error::Other(_) => 500,
        }
    }

    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::MissingVariables(_) => "MISSING_VARIABLES",
            Error::Precondition(_) => "PRECONDITION_FAILED",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Upstream { .. } => "UPSTREAM_ERROR",
            Error::Timeout(_) => "UPSTREAM_TIMEOUT",
            Error::Unavailable(_) => "SERVICE_UNAVAILABLE",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}
