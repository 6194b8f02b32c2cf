use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Correlation error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelatorError {
    /// Bad caller arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Named alerting rule does not exist
    #[error("Alerting rule not found: {0}")]
    NotFound(String),

    /// Rule exists but has no firing instance
    #[error("Requested alert no longer fires, alertname: {0}")]
    NoActiveInstance(String),

    /// Rule expression failed to parse
    #[error("Invalid query {query:?}: {message}")]
    InvalidQuery { query: String, message: String },

    /// Expression yields no usable matcher group
    #[error("No selectors found in {0}")]
    NoSelectors(String),

    /// Transport or protocol failure talking to a backend
    #[error("Upstream error ({backend}): {message}")]
    Upstream { backend: String, message: String },

    /// Malformed source or service configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller cancellation or deadline
    #[error("Operation canceled: {0}")]
    Canceled(String),
}

impl CorrelatorError {
    pub fn upstream(backend: impl Into<String>, message: impl Into<String>) -> Self {
        CorrelatorError::Upstream {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn invalid_query(query: impl Into<String>, message: impl Into<String>) -> Self {
        CorrelatorError::InvalidQuery {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CorrelatorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            CorrelatorError::NotFound(_) => StatusCode::NOT_FOUND,
            CorrelatorError::NoActiveInstance(_) => StatusCode::CONFLICT,
            CorrelatorError::InvalidQuery { .. } => StatusCode::BAD_REQUEST,
            CorrelatorError::NoSelectors(_) => StatusCode::BAD_REQUEST,
            CorrelatorError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            CorrelatorError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CorrelatorError::Canceled(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            CorrelatorError::InvalidInput(_) => "INVALID_INPUT",
            CorrelatorError::NotFound(_) => "NOT_FOUND",
            CorrelatorError::NoActiveInstance(_) => "NO_ACTIVE_INSTANCE",
            CorrelatorError::InvalidQuery { .. } => "INVALID_QUERY",
            CorrelatorError::NoSelectors(_) => "NO_SELECTORS",
            CorrelatorError::Upstream { .. } => "UPSTREAM_ERROR",
            CorrelatorError::Config(_) => "CONFIG_ERROR",
            CorrelatorError::Canceled(_) => "CANCELED",
        }
    }
}

/// Convert CorrelatorError to HTTP response
impl IntoResponse for CorrelatorError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::error!(
            error_code = error_code,
            status_code = status.as_u16(),
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for CorrelatorError {
    fn from(err: validator::ValidationErrors) -> Self {
        CorrelatorError::InvalidInput(err.to_string())
    }
}

impl From<config::ConfigError> for CorrelatorError {
    fn from(err: config::ConfigError) -> Self {
        CorrelatorError::Config(err.to_string())
    }
}

impl From<url::ParseError> for CorrelatorError {
    fn from(err: url::ParseError) -> Self {
        CorrelatorError::Config(format!("invalid endpoint URL: {}", err))
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CorrelatorError>;
